//! `ufog start`: launch a run, either embedded in this process or against
//! a remote SimBridge server.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ufog_core::prelude::*;
use ufog_runtime::prelude::{Run, RunStatus};

use crate::config::load_config;
use crate::error::CliError;

pub struct StartArgs {
    pub config_path: Option<PathBuf>,
    pub num_agents: Option<u32>,
    pub seed: Option<u64>,
    pub server: Option<String>,
    pub quiet: bool,
}

pub async fn run(args: StartArgs) -> Result<(), CliError> {
    let mut config = match &args.config_path {
        Some(path) => load_config(path).map_err(|e| CliError::Config(e.to_string()))?,
        None => SimConfig::default(),
    };
    if let Some(n) = args.num_agents {
        config.num_agents = n;
    }
    if let Some(s) = args.seed {
        config.seed = s;
    }

    match &args.server {
        Some(server) => run_remote(server, config, args.quiet).await,
        None => run_embedded(config, args.quiet).await,
    }
}

async fn run_remote(server: &str, config: SimConfig, quiet: bool) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/sim/start", server.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .json(&config)
        .send()
        .await
        .map_err(|e| CliError::Runtime(format!("failed to reach {server}: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CliError::Runtime(format!(
            "server rejected start ({status}): {body}"
        )));
    }
    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| CliError::Runtime(format!("invalid response from server: {e}")))?;
    if !quiet {
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    }
    Ok(())
}

async fn run_embedded(config: SimConfig, quiet: bool) -> Result<(), CliError> {
    let mut run = Run::new(config).map_err(|e| CliError::Config(e.to_string()))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    if !quiet {
        println!(
            "run {} starting: {} agents, {} steps",
            run.run_id, run.config.num_agents, run.total_steps
        );
    }

    loop {
        if interrupted.load(Ordering::SeqCst) {
            run.request_stop();
        }
        let events = run.step();
        if !quiet && events.iter().any(|e| matches!(e, Event::GenerationComplete { .. })) {
            println!("  step {}: generation boundary", run.current_step);
        }
        if run.status == RunStatus::Completed
            || run.status == RunStatus::Stopped
            || run.status == RunStatus::Failed
        {
            break;
        }
    }

    if !quiet {
        println!(
            "run {} finished: status={:?}, step={}, alive_agents={}",
            run.run_id,
            run.status,
            run.current_step,
            run.alive_count()
        );
    }

    if interrupted.load(Ordering::SeqCst) && run.status == RunStatus::Stopped {
        return Err(CliError::Interrupted);
    }
    Ok(())
}
