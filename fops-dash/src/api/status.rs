//! Connection and presence status

use axum::{extract::State, Json};
use serde::Serialize;

use fops_common::status::{DashboardStatus, StatusSnapshot};

use super::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: DashboardStatus,
    /// Latest manager presence snapshot; absent until the first poll lands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<StatusSnapshot>,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.runtime.status().await?;
    let snapshot = state.runtime.snapshot().await?;
    Ok(Json(StatusResponse { status, snapshot }))
}
