//! Live stream connector
//!
//! Connection lifecycle for the single inbound activity stream:
//!
//! ```text
//! Closed --connect()--> Connecting --on_open--> Open --on_close--> Closed
//!                                                    --on_error--> Errored
//! ```
//!
//! The connector never retries on its own. A supervisor owns the transport
//! and a [`ReconnectPolicy`], and calls [`StreamConnector::connect`] again
//! when it decides to. Every transport callback carries the [`AttemptId`]
//! returned by `connect()`; callbacks for an older attempt, or arriving
//! after [`StreamConnector::disconnect`], are ignored.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::events::{ActivityKind, EventId, Priority, StreamEvent};
use crate::Result;

/// Connection state, owned by the connector and observed by everyone else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Identifies one `connect()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ========================================
// Wire format
// ========================================

/// Outer `{ "type", "payload" }` envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Payload of an `agent_activity` message
#[derive(Debug, Deserialize)]
struct WireActivity {
    id: String,
    kind: ActivityKind,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "requiresApproval")]
    requires_approval: bool,
    #[serde(default)]
    data: Value,
}

/// Payload of a `manager_interaction` message
#[derive(Debug, Deserialize)]
struct WireInteraction {
    #[serde(default)]
    id: Option<String>,
    manager: String,
    agent: String,
    summary: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Why an inbound message produced no event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    /// Not JSON, missing fields, or an empty id
    Malformed(String),
    /// Well-formed envelope with a type this build does not handle
    UnknownType(String),
}

/// Parse one raw inbound message
///
/// `Ok(None)` for heartbeats. Never panics on arbitrary input.
///
/// # Examples
///
/// ```
/// use fops_common::connector::parse_message;
///
/// let raw = r#"{"type":"agent_activity","payload":{"id":"a1","kind":"quote_sent","requires_approval":true}}"#;
/// let event = parse_message(raw).unwrap().unwrap();
/// assert!(event.requires_approval);
///
/// assert_eq!(parse_message(r#"{"type":"heartbeat"}"#), Ok(None));
/// assert!(parse_message("not json").is_err());
/// ```
pub fn parse_message(raw: &str) -> std::result::Result<Option<StreamEvent>, Rejected> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| Rejected::Malformed(e.to_string()))?;

    match envelope.kind.as_str() {
        "agent_activity" => {
            let wire: WireActivity = serde_json::from_value(envelope.payload)
                .map_err(|e| Rejected::Malformed(e.to_string()))?;
            if wire.id.trim().is_empty() {
                return Err(Rejected::Malformed("empty event id".to_string()));
            }
            Ok(Some(StreamEvent {
                id: EventId::new(wire.id),
                kind: wire.kind,
                priority: wire.priority,
                timestamp: wire.timestamp.unwrap_or_else(Utc::now),
                payload: wire.data,
                requires_approval: wire.requires_approval,
                caused_by: None,
            }))
        }
        "manager_interaction" => {
            let payload = envelope.payload.clone();
            let wire: WireInteraction = serde_json::from_value(envelope.payload)
                .map_err(|e| Rejected::Malformed(e.to_string()))?;
            debug!(manager = %wire.manager, agent = %wire.agent, summary = %wire.summary, "Manager interaction");
            let id = match wire.id {
                Some(id) if !id.trim().is_empty() => EventId::new(id),
                _ => EventId::generate(),
            };
            Ok(Some(StreamEvent {
                id,
                kind: ActivityKind::ManagerInteraction,
                priority: Priority::Normal,
                timestamp: wire.timestamp.unwrap_or_else(Utc::now),
                payload,
                requires_approval: false,
                caused_by: None,
            }))
        }
        "heartbeat" => Ok(None),
        other => Err(Rejected::UnknownType(other.to_string())),
    }
}

// ========================================
// Connector
// ========================================

/// Connection primitive: state machine plus message parsing
///
/// Holds no socket. A supervisor reports transport callbacks into it.
#[derive(Debug)]
pub struct StreamConnector {
    state_tx: watch::Sender<ConnectionState>,
    next_attempt: u64,
    /// Attempt whose callbacks are honoured; `None` once closed or torn down
    current: Option<AttemptId>,
    last_error: Option<String>,
}

impl StreamConnector {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            state_tx,
            next_attempt: 0,
            current: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a new attempt, superseding any previous one
    pub fn connect(&mut self) -> AttemptId {
        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);
        if let Some(previous) = self.current.replace(attempt) {
            debug!(%previous, %attempt, "Superseding connection attempt");
        }
        info!(%attempt, "Connecting to live stream");
        self.set_state(ConnectionState::Connecting);
        attempt
    }

    /// Transport opened; true when this moved the connector to `Open`
    pub fn on_open(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) || self.state() != ConnectionState::Connecting {
            debug!(%attempt, "Ignoring open for stale attempt");
            return false;
        }
        self.last_error = None;
        info!(%attempt, "Live stream connected");
        self.set_state(ConnectionState::Open)
    }

    /// Parse a message from `attempt`
    ///
    /// Stale, malformed and unknown messages yield `None` and are logged.
    pub fn on_message(&self, attempt: AttemptId, raw: &str) -> Option<StreamEvent> {
        if !self.is_current(attempt) || self.state() != ConnectionState::Open {
            debug!(%attempt, "Ignoring message for stale attempt");
            return None;
        }
        match parse_message(raw) {
            Ok(event) => event,
            Err(Rejected::UnknownType(kind)) => {
                debug!(message_type = %kind, "Ignoring unrecognized message type");
                None
            }
            Err(Rejected::Malformed(reason)) => {
                warn!(%attempt, %reason, "Dropping malformed stream message");
                None
            }
        }
    }

    /// Transport closed cleanly; true when state changed
    pub fn on_close(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) {
            debug!(%attempt, "Ignoring close for stale attempt");
            return false;
        }
        self.current = None;
        info!(%attempt, "Live stream closed");
        self.set_state(ConnectionState::Closed)
    }

    /// Transport failed; true when state changed
    pub fn on_error(&mut self, attempt: AttemptId, error: &str) -> bool {
        if !self.is_current(attempt) {
            debug!(%attempt, %error, "Ignoring error for stale attempt");
            return false;
        }
        self.current = None;
        self.last_error = Some(error.to_string());
        warn!(%attempt, %error, "Live stream error");
        self.set_state(ConnectionState::Errored)
    }

    /// Tear down from any state; idempotent
    ///
    /// Returns true when state changed. Later callbacks for the abandoned
    /// attempt are ignored.
    pub fn disconnect(&mut self) -> bool {
        if let Some(attempt) = self.current.take() {
            info!(%attempt, "Disconnecting live stream");
        }
        self.set_state(ConnectionState::Closed)
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.current == Some(attempt)
    }

    fn set_state(&mut self, state: ConnectionState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }
}

impl Default for StreamConnector {
    fn default() -> Self {
        Self::new()
    }
}

// ========================================
// Reconnect policy
// ========================================

/// Capped exponential backoff for the supervising reconnect loop
///
/// Pure value: no timers, no I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` once exhausted
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use fops_common::connector::ReconnectPolicy;
    ///
    /// let policy = ReconnectPolicy {
    ///     initial_backoff: Duration::from_millis(100),
    ///     max_backoff: Duration::from_millis(1000),
    ///     multiplier: 2.0,
    ///     max_retries: Some(3),
    /// };
    /// assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
    /// assert_eq!(policy.delay_for(4), None);
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        if matches!(self.max_retries, Some(max) if attempt > max) {
            return None;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let nanos = self.initial_backoff.as_nanos() as f64 * factor;

        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            Some(self.max_backoff)
        } else {
            Some(Duration::from_nanos(nanos.round() as u64))
        }
    }
}

/// Consecutive-failure counter around a [`ReconnectPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failure; delay before the next attempt, or `None` to give up
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_for(self.failures)
    }

    /// Successful open
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

// ========================================
// Transport seam
// ========================================

/// Byte-level stream connection driven by a supervisor
///
/// Implementations deliver whole text messages; framing is theirs.
#[async_trait]
pub trait StreamTransport: Send {
    /// Establish the connection
    async fn open(&mut self) -> Result<()>;

    /// Next raw message; `Ok(None)` when the peer closed the stream
    async fn next_message(&mut self) -> Result<Option<String>>;

    /// Release the connection; safe to call when not open
    async fn close(&mut self);
}
