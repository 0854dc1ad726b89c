//! Server-Sent Events relay of dashboard events
//!
//! Each client first receives a `ConnectionStatus` event with the current
//! connection state and pending count, then every bus event as it is
//! emitted. A client that falls behind the bus loses the overflowed events
//! and keeps receiving from the newest.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::AppState;

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe before reading status so nothing emitted in between is missed
    let rx = state.bus.subscribe();

    let initial = match state.runtime.status().await {
        Ok(status) => Event::default()
            .event("ConnectionStatus")
            .json_data(status)
            .ok(),
        Err(e) => {
            warn!("SSE initial status unavailable: {}", e);
            None
        }
    };

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    let event_type = event.event_type();
                    debug!("Broadcasting SSE event: {}", event_type);
                    Some(Ok(Event::default().event(event_type).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("SSE client lagged: {:?}", e);
                None
            }
        }
    });

    let stream = stream::iter(initial.map(Ok)).chain(updates);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
