//! Activity feed and approval decisions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use fops_common::approval::Decision;
use fops_common::events::{EventId, StreamEvent, Tone};

use super::ApiError;
use crate::AppState;

/// Default number of feed entries returned
const DEFAULT_FEED_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

fn default_feed_limit() -> usize {
    DEFAULT_FEED_LIMIT
}

/// Feed or approval entry with its display label and tone
#[derive(Debug, Serialize)]
pub struct FeedRow {
    #[serde(flatten)]
    pub event: StreamEvent,
    pub label: &'static str,
    pub tone: Tone,
}

impl From<StreamEvent> for FeedRow {
    fn from(event: StreamEvent) -> Self {
        Self {
            label: event.label(),
            tone: event.tone(),
            event,
        }
    }
}

fn rows(events: Vec<StreamEvent>) -> Vec<FeedRow> {
    events.into_iter().map(FeedRow::from).collect()
}

/// Acknowledgement for a queued decision
///
/// The decision is applied by the runtime in arrival order; repeated or
/// late decisions for the same event are ignored there.
#[derive(Debug, Serialize)]
pub struct DecisionAccepted {
    pub id: String,
    pub decision: Decision,
    pub status: &'static str,
}

/// GET /api/feed?limit=N
///
/// Newest first.
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedRow>>, ApiError> {
    let events = state.runtime.feed(query.limit).await?;
    Ok(Json(rows(events)))
}

/// GET /api/approvals
pub async fn list_approvals(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedRow>>, ApiError> {
    let pending = state.runtime.pending().await?;
    Ok(Json(rows(pending)))
}

/// POST /api/approvals/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DecisionAccepted>), ApiError> {
    submit(state, id, Decision::Approved).await
}

/// POST /api/approvals/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DecisionAccepted>), ApiError> {
    submit(state, id, Decision::Rejected).await
}

async fn submit(
    state: AppState,
    id: String,
    decision: Decision,
) -> Result<(StatusCode, Json<DecisionAccepted>), ApiError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidParameter {
            name: "id",
            value: id,
        });
    }

    info!(id = trimmed, %decision, "Decision submitted");
    state
        .runtime
        .decide(EventId::new(trimmed), decision)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DecisionAccepted {
            id: trimmed.to_string(),
            decision,
            status: "accepted",
        }),
    ))
}
