//! Connected-managers status poller
//!
//! Refetches the status endpoint on a fixed interval. Each fetch runs in
//! its own task tagged with the tick's sequence number, so a slow response
//! never delays the next tick; the runtime's status board drops whichever
//! result arrives out of order.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fops_common::status::{ManagerPresence, StatusSnapshot};
use fops_common::{Error, Result};

use crate::runtime::RuntimeHandle;

/// Per-request timeout
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Status endpoint body: either a bare list or `{ "managers": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusBody {
    List(Vec<ManagerPresence>),
    Wrapped { managers: Vec<ManagerPresence> },
}

impl From<StatusBody> for StatusSnapshot {
    fn from(body: StatusBody) -> Self {
        match body {
            StatusBody::List(managers) | StatusBody::Wrapped { managers } => {
                StatusSnapshot::new(managers)
            }
        }
    }
}

/// Fetch one snapshot
pub async fn fetch_status(client: &reqwest::Client, url: &str) -> Result<StatusSnapshot> {
    let body: StatusBody = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?
        .error_for_status()
        .map_err(|e| Error::Transport(e.to_string()))?
        .json()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    Ok(body.into())
}

/// Poll `url` every `interval` until cancelled
pub async fn run_status_poller(
    client: reqwest::Client,
    url: String,
    interval: Duration,
    runtime: RuntimeHandle,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        seq += 1;
        let client = client.clone();
        let url = url.clone();
        let runtime = runtime.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return,
                fetched = fetch_status(&client, &url) => fetched,
            };
            match fetched {
                Ok(snapshot) => {
                    debug!(seq, managers = snapshot.managers.len(), "Status snapshot fetched");
                    let _ = runtime.replace_status(seq, snapshot).await;
                }
                Err(e) => warn!(seq, error = %e, "Status poll failed"),
            }
        });
    }

    debug!("Status poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, routing::get, Json, Router};
    use serde_json::{json, Value};

    use fops_common::approval::GateLimits;
    use fops_common::events::{DashboardEvent, EventBus};

    use crate::runtime::spawn_runtime;

    /// Serve a status route whose first `slow_calls` responses take `delay`
    async fn serve_status(slow_calls: usize, delay: Duration) -> String {
        async fn handler(
            State((calls, slow_calls, delay)): State<(Arc<AtomicUsize>, usize, Duration)>,
        ) -> Json<Value> {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if call < slow_calls {
                tokio::time::sleep(delay).await;
                return Json(json!([{"id": "m-old", "name": "stale", "online": true}]));
            }
            Json(json!({"managers": [{"id": "m-new", "name": "fresh", "online": true}]}))
        }

        let app = Router::new()
            .route("/status", get(handler))
            .with_state((Arc::new(AtomicUsize::new(0)), slow_calls, delay));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/status", addr)
    }

    #[test]
    fn test_status_body_accepts_both_shapes() {
        let list: StatusBody =
            serde_json::from_str(r#"[{"id":"m1","name":"Dana","online":true}]"#).unwrap();
        let wrapped: StatusBody = serde_json::from_str(
            r#"{"managers":[{"id":"m1","name":"Dana","online":true},{"id":"m2","name":"Lee"}]}"#,
        )
        .unwrap();

        assert_eq!(StatusSnapshot::from(list).managers_connected(), 1);
        let snapshot = StatusSnapshot::from(wrapped);
        assert_eq!(snapshot.managers.len(), 2);
        assert_eq!(snapshot.managers_connected(), 1);
    }

    #[test]
    fn test_status_body_rejects_garbage() {
        assert!(serde_json::from_str::<StatusBody>(r#"{"status":"ok"}"#).is_err());
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_slow_stale_poll_never_replaces_newer_snapshot() {
        let url = serve_status(1, Duration::from_millis(300)).await;
        let bus = EventBus::new(256);
        let mut events = bus.subscribe();
        let (runtime, _task) =
            spawn_runtime(GateLimits::default(), bus, None, CancellationToken::new());
        let cancel = CancellationToken::new();

        let poller = tokio::spawn(run_status_poller(
            local_client(),
            url,
            Duration::from_millis(50),
            runtime.clone(),
            cancel.clone(),
        ));

        // Long enough for the slow first response to come back late
        tokio::time::sleep(Duration::from_millis(600)).await;
        cancel.cancel();
        poller.await.unwrap();

        let snapshot = runtime.snapshot().await.unwrap().expect("a snapshot landed");
        assert_eq!(snapshot.managers[0].name, "fresh");

        while let Ok(event) = events.try_recv() {
            if let DashboardEvent::StatusSnapshotReplaced { snapshot } = event {
                assert!(snapshot.managers.iter().all(|m| m.name == "fresh"));
            }
        }
    }

    #[tokio::test]
    async fn test_no_snapshot_lands_after_cancel() {
        let url = serve_status(usize::MAX, Duration::from_millis(200)).await;
        let (runtime, _task) = spawn_runtime(
            GateLimits::default(),
            EventBus::new(16),
            None,
            CancellationToken::new(),
        );
        let cancel = CancellationToken::new();

        let poller = tokio::spawn(run_status_poller(
            local_client(),
            url,
            Duration::from_secs(3600),
            runtime.clone(),
            cancel.clone(),
        ));

        // First tick fires immediately; its fetch is still in flight here
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        poller.await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runtime.snapshot().await.unwrap(), None);
        assert_eq!(runtime.status().await.unwrap().managers_connected, 0);
    }
}
