//! `ufog status`: query a remote SimBridge server for one or all runs.

use crate::error::CliError;

pub async fn run(server: &str, run_id: Option<String>) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let mut url = format!("{}/sim/status", server.trim_end_matches('/'));
    if let Some(id) = &run_id {
        url = format!("{url}?run_id={id}");
    }
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| CliError::Runtime(format!("failed to reach {server}: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        return Err(CliError::Runtime(format!("server returned {status}")));
    }
    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| CliError::Runtime(format!("invalid response from server: {e}")))?;
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    Ok(())
}
