//! Decision webhook
//!
//! Operator decisions that take effect are POSTed to an optional webhook.
//! Delivery is fire-and-forget from the runtime's point of view: the
//! outcome comes back later as a feed notice, never as a return value.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use fops_common::approval::Decision;
use fops_common::events::{ActivityKind, EventId, StreamEvent};

use crate::runtime::{Resolution, RuntimeHandle};

/// Webhook request timeout
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Body POSTed per decision
#[derive(Debug, Serialize)]
pub struct DecisionPayload<'a> {
    pub event_id: &'a EventId,
    pub decision: Decision,
    pub resolution_id: &'a EventId,
    pub decided_at: DateTime<Utc>,
}

/// HTTP client bound to the decision webhook
#[derive(Clone)]
pub struct DecisionDispatcher {
    client: reqwest::Client,
    url: String,
}

impl DecisionDispatcher {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver in the background; the outcome is posted back through `runtime`
    pub fn dispatch(&self, resolution: Resolution, runtime: RuntimeHandle) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let notice = match dispatcher.deliver(&resolution).await {
                Ok(()) => {
                    debug!(event_id = %resolution.original_id, "Decision delivered");
                    delivery_notice(&resolution, None)
                }
                Err(reason) => {
                    warn!(event_id = %resolution.original_id, %reason, "Decision delivery failed");
                    delivery_notice(&resolution, Some(reason))
                }
            };
            if runtime.notice(notice).await.is_err() {
                debug!("Runtime gone before delivery notice");
            }
        });
    }

    async fn deliver(&self, resolution: &Resolution) -> Result<(), String> {
        let payload = DecisionPayload {
            event_id: &resolution.original_id,
            decision: resolution.decision,
            resolution_id: &resolution.resolution.id,
            decided_at: resolution.resolution.timestamp,
        };

        let response = self
            .client
            .post(&self.url)
            .timeout(DISPATCH_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        response
            .error_for_status()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Feed notice describing a delivery outcome; `error` set on failure
pub fn delivery_notice(resolution: &Resolution, error: Option<String>) -> StreamEvent {
    let kind = if error.is_some() {
        ActivityKind::DecisionDispatchFailed
    } else {
        ActivityKind::DecisionDispatched
    };

    let mut payload = json!({
        "original_id": resolution.original_id,
        "decision": resolution.decision,
    });
    if let Some(error) = error {
        payload["error"] = json!(error);
    }

    StreamEvent::new(EventId::generate(), kind, payload)
        .with_priority(resolution.resolution.priority)
        .caused_by(resolution.original_id.clone())
}
