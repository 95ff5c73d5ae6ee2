//! REST endpoints for run lifecycle control (spec §6).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use ufog_core::prelude::*;

use crate::manager::RunManager;
use crate::message::RunStatusSnapshot;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub run_id: RunId,
    pub status: String,
}

/// `POST /sim/start`: validate `config`, allocate a run, start its driver
/// thread. Rejects synchronously with `400` on a configuration error
/// (spec §7).
pub async fn start(
    State(manager): State<RunManager>,
    Json(config): Json<SimConfig>,
) -> Result<Json<StartResponse>, (StatusCode, String)> {
    let run_id = manager
        .create_run(config)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    manager
        .start(run_id)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "run vanished before start".to_string()))?;
    Ok(Json(StartResponse {
        run_id,
        status: "starting".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub run_id: RunId,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub run_id: RunId,
    pub status: String,
}

/// `POST /sim/stop`: cooperative stop, returns only after the run's
/// driver thread has published `done` and exited (spec §6).
pub async fn stop(
    State(manager): State<RunManager>,
    Json(req): Json<StopRequest>,
) -> Result<Json<StopResponse>, StatusCode> {
    let final_status = manager
        .stop(req.run_id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Json(StopResponse {
        run_id: req.run_id,
        status: format!("{final_status:?}").to_lowercase(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub run_id: Option<RunId>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatusResponse {
    One(RunStatusSnapshot),
    Many(Vec<RunStatusSnapshot>),
}

/// `GET /sim/status[?run_id=...]`: one run's status, or all runs when
/// `run_id` is omitted.
pub async fn status(
    State(manager): State<RunManager>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, StatusCode> {
    match query.run_id {
        Some(run_id) => {
            let snap = manager.status(run_id).map_err(|_| StatusCode::NOT_FOUND)?;
            Ok(Json(StatusResponse::One(snap)))
        }
        None => Ok(Json(StatusResponse::Many(manager.list()))),
    }
}

/// `GET /health`: process liveness plus a summary of active runs.
pub async fn health(State(manager): State<RunManager>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "bridge_status": manager.health_summary(),
    }))
}
