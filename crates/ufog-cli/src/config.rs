//! Config-file loading for the CLI front end.
//!
//! `SimConfig` (spec §6) is already the wire/runtime configuration type,
//! so unlike the teacher's `phago_cli::config::Config` (a CLI-specific
//! superset of runtime config, loaded from `phago.toml`), this just reads
//! `SimConfig` itself from a TOML file, following the pack's
//! `toml` + `serde` config-file idiom.

use std::path::Path;

use anyhow::{Context, Result};
use ufog_core::prelude::SimConfig;

/// Load a `SimConfig` from a TOML file. Unknown keys are rejected by
/// `SimConfig`'s `#[serde(deny_unknown_fields)]`.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: SimConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}
