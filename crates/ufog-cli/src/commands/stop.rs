//! `ufog stop`: request a cooperative stop of a run on a remote SimBridge
//! server.

use crate::error::CliError;

pub async fn run(server: &str, run_id: String) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/sim/stop", server.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .json(&serde_json::json!({ "run_id": run_id }))
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
