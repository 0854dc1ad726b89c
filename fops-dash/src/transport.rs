//! Live stream transport and reconnect supervisor
//!
//! [`SseTransport`] reads the upstream activity stream as Server-Sent
//! Events over HTTP. [`run_supervisor`] drives any [`StreamTransport`]
//! through the runtime's connector, applying the reconnect policy between
//! attempts and tearing down when cancelled.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fops_common::connector::{AttemptId, Backoff, ReconnectPolicy, StreamTransport};
use fops_common::{Error, Result};

use crate::runtime::RuntimeHandle;

/// Longest unterminated line the decoder buffers before dropping the frame
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental SSE frame decoder
///
/// Collects `data:` lines until a blank line, then yields them joined by
/// newlines. Comments, `event:`, `id:` and `retry:` fields are skipped.
/// A line longer than [`MAX_LINE_BYTES`] drops the whole frame it is in.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    /// Rest of an oversized line is still arriving
    discarding: bool,
    /// Buffered bytes ahead of a dropped line; its frame is poisoned once they are consumed
    dropped_at: Option<usize>,
    /// Current frame lost a line; discard it at the next boundary
    skip_frame: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut bytes: &[u8]) {
        if self.discarding {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    bytes = &bytes[pos + 1..];
                }
                None => return,
            }
        }
        self.buffer.extend_from_slice(bytes);

        let line_start = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let partial = self.buffer.len() - line_start;
        if partial > MAX_LINE_BYTES {
            warn!(bytes = partial, "SSE line exceeds limit, frame dropped");
            self.buffer.truncate(line_start);
            self.discarding = true;
            self.dropped_at = Some(line_start);
        }
    }

    /// Next complete event payload, if one is buffered
    pub fn next_event(&mut self) -> Option<String> {
        loop {
            if self.dropped_at == Some(0) {
                self.dropped_at = None;
                self.skip_frame = true;
            }
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            if let Some(remaining) = self.dropped_at.as_mut() {
                *remaining -= pos + 1;
            }
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if std::mem::take(&mut self.skip_frame) {
                    self.data.clear();
                    continue;
                }
                if self.data.is_empty() {
                    continue;
                }
                let payload = self.data.join("\n");
                self.data.clear();
                return Some(payload);
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (&*line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }
        None
    }
}

/// SSE-over-HTTP stream client
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
    response: Option<reqwest::Response>,
    decoder: SseDecoder,
}

impl SseTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            response: None,
            decoder: SseDecoder::new(),
        }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn open(&mut self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Transport(e.to_string()))?;

        self.decoder = SseDecoder::new();
        self.response = Some(response);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(message) = self.decoder.next_event() {
                return Ok(Some(message));
            }
            let Some(response) = self.response.as_mut() else {
                return Ok(None);
            };
            match response
                .chunk()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?
            {
                Some(chunk) => self.decoder.push(&chunk),
                None => {
                    self.response = None;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        self.response = None;
    }
}

/// How one connection attempt ended
enum AttemptEnd {
    Closed,
    Failed(String),
    Cancelled,
}

/// Drive `transport` until cancelled or the reconnect policy gives up
///
/// Every callback into the runtime carries the attempt id, so a late
/// message from an abandoned attempt is discarded by the connector.
pub async fn run_supervisor<T: StreamTransport>(
    mut transport: T,
    runtime: RuntimeHandle,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(policy);

    while !cancel.is_cancelled() {
        let Ok(attempt) = runtime.connect().await else {
            break;
        };

        let end = tokio::select! {
            _ = cancel.cancelled() => AttemptEnd::Cancelled,
            opened = transport.open() => match opened {
                Ok(()) => {
                    backoff.reset();
                    if runtime.opened(attempt).await.is_err() {
                        break;
                    }
                    pump(&mut transport, &runtime, attempt, &cancel).await
                }
                Err(e) => AttemptEnd::Failed(e.to_string()),
            },
        };

        transport.close().await;
        let reported = match end {
            AttemptEnd::Cancelled => break,
            AttemptEnd::Closed => runtime.closed(attempt).await,
            AttemptEnd::Failed(error) => runtime.errored(attempt, error).await,
        };
        if reported.is_err() {
            break;
        }

        let Some(delay) = backoff.next_delay() else {
            warn!(
                failures = backoff.failures(),
                "Reconnect attempts exhausted, live stream stays closed"
            );
            break;
        };
        info!(
            failures = backoff.failures(),
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to live stream after backoff"
        );
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    transport.close().await;
    let _ = runtime.disconnect().await;
    debug!("Stream supervisor stopped");
}

async fn pump<T: StreamTransport>(
    transport: &mut T,
    runtime: &RuntimeHandle,
    attempt: AttemptId,
    cancel: &CancellationToken,
) -> AttemptEnd {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return AttemptEnd::Cancelled,
            next = transport.next_message() => next,
        };
        match next {
            Ok(Some(raw)) => {
                if runtime.message(attempt, raw).await.is_err() {
                    return AttemptEnd::Cancelled;
                }
            }
            Ok(None) => return AttemptEnd::Closed,
            Err(e) => return AttemptEnd::Failed(e.to_string()),
        }
    }
}

/// Policy with a short fixed delay, for tests and local development
pub fn immediate_policy(max_retries: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 1.0,
        max_retries: Some(max_retries),
    }
}
