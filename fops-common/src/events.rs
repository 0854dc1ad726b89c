//! Event types for the dashboard event system
//!
//! Two layers of events live here:
//! - [`StreamEvent`]: an immutable activity record received over the live
//!   stream (or synthesized by the approval gate). Shown in the feed.
//! - [`DashboardEvent`]: internal notifications broadcast over the
//!   [`EventBus`] to status indicators and SSE clients.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::approval::Decision;
use crate::connector::ConnectionState;
use crate::status::StatusSnapshot;

/// Stream event identifier, unique per upstream event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for locally synthesized events
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Visual tone a presentation layer maps to a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

/// Kind of activity carried by a [`StreamEvent`]
///
/// Label and tone come from an exhaustive match, so adding a kind without
/// a display entry fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    JobDispatched,
    QuoteSent,
    InvoiceIssued,
    PaymentCollected,
    ReviewRequested,
    ScheduleChanged,
    Escalation,
    /// Manager ↔ agent interaction notice
    ManagerInteraction,
    /// Synthesized when an operator approves a gated event
    ApprovalConfirmed,
    /// Synthesized when an operator rejects a gated event
    ApprovalRejected,
    /// Decision side effect reached the upstream system
    DecisionDispatched,
    /// Decision side effect failed
    DecisionDispatchFailed,
    /// Any kind this build does not know
    #[serde(other)]
    Other,
}

impl ActivityKind {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityKind::JobDispatched => "Job dispatched",
            ActivityKind::QuoteSent => "Quote sent",
            ActivityKind::InvoiceIssued => "Invoice issued",
            ActivityKind::PaymentCollected => "Payment collected",
            ActivityKind::ReviewRequested => "Review requested",
            ActivityKind::ScheduleChanged => "Schedule changed",
            ActivityKind::Escalation => "Escalation",
            ActivityKind::ManagerInteraction => "Manager interaction",
            ActivityKind::ApprovalConfirmed => "Approved",
            ActivityKind::ApprovalRejected => "Rejected",
            ActivityKind::DecisionDispatched => "Decision delivered",
            ActivityKind::DecisionDispatchFailed => "Decision delivery failed",
            ActivityKind::Other => "Activity",
        }
    }

    pub const fn tone(self) -> Tone {
        match self {
            ActivityKind::JobDispatched
            | ActivityKind::QuoteSent
            | ActivityKind::ScheduleChanged
            | ActivityKind::ManagerInteraction => Tone::Info,
            ActivityKind::InvoiceIssued | ActivityKind::ReviewRequested => Tone::Neutral,
            ActivityKind::PaymentCollected
            | ActivityKind::ApprovalConfirmed
            | ActivityKind::DecisionDispatched => Tone::Success,
            ActivityKind::Escalation | ActivityKind::ApprovalRejected => Tone::Warning,
            ActivityKind::DecisionDispatchFailed => Tone::Danger,
            ActivityKind::Other => Tone::Neutral,
        }
    }
}

/// Event priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Immutable activity record shown in the live feed
///
/// Never edited after creation; approval decisions produce new events
/// whose `caused_by` points at the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: EventId,
    pub kind: ActivityKind,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<EventId>,
}

impl StreamEvent {
    /// Ungated, normal-priority event stamped now
    pub fn new(id: EventId, kind: ActivityKind, payload: Value) -> Self {
        Self {
            id,
            kind,
            priority: Priority::Normal,
            timestamp: Utc::now(),
            payload,
            requires_approval: false,
            caused_by: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn caused_by(mut self, id: EventId) -> Self {
        self.caused_by = Some(id);
        self
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn tone(&self) -> Tone {
        self.kind.tone()
    }
}

/// Dashboard-wide notifications
///
/// Broadcast via [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    /// Live stream connection changed state
    ///
    /// Triggers:
    /// - Status indicator: connected / disconnected badge
    ConnectionStateChanged {
        state: ConnectionState,
        timestamp: DateTime<Utc>,
    },

    /// An event was added to the newest end of the feed
    FeedEventAdded { event: StreamEvent },

    /// A gated event is waiting on an operator decision
    ApprovalRequested { event: StreamEvent },

    /// A pending event was decided
    ///
    /// `resolution` is the synthetic confirmation / rejection in the feed.
    ApprovalResolved {
        original_id: EventId,
        decision: Decision,
        resolution: StreamEvent,
    },

    /// Size of the pending-approval set changed
    PendingCountChanged { count: usize },

    /// Polled status snapshot replaced the previous one
    StatusSnapshotReplaced { snapshot: StatusSnapshot },
}

impl DashboardEvent {
    /// Get event type as string for filtering / SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::ConnectionStateChanged { .. } => "ConnectionStateChanged",
            DashboardEvent::FeedEventAdded { .. } => "FeedEventAdded",
            DashboardEvent::ApprovalRequested { .. } => "ApprovalRequested",
            DashboardEvent::ApprovalResolved { .. } => "ApprovalResolved",
            DashboardEvent::PendingCountChanged { .. } => "PendingCountChanged",
            DashboardEvent::StatusSnapshotReplaced { .. } => "StatusSnapshotReplaced",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central distribution bus for dashboard events
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use fops_common::events::{DashboardEvent, EventBus};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(DashboardEvent::PendingCountChanged { count: 2 });
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.event_type(), "PendingCountChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Capacity is the number of events buffered per subscriber before the
    /// oldest are dropped for that subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DashboardEvent,
    ) -> Result<usize, broadcast::error::SendError<DashboardEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_kind_deserializes_to_other() {
        let kind: ActivityKind = serde_json::from_value(json!("warranty_claim")).unwrap();
        assert_eq!(kind, ActivityKind::Other);

        let kind: ActivityKind = serde_json::from_value(json!("quote_sent")).unwrap();
        assert_eq!(kind, ActivityKind::QuoteSent);
    }

    #[test]
    fn test_lookup_table_covers_synthetic_kinds() {
        assert_eq!(ActivityKind::ApprovalConfirmed.tone(), Tone::Success);
        assert_eq!(ActivityKind::ApprovalRejected.tone(), Tone::Warning);
        assert_eq!(ActivityKind::DecisionDispatchFailed.tone(), Tone::Danger);
        assert_eq!(ActivityKind::ApprovalConfirmed.label(), "Approved");
    }

    #[test]
    fn test_stream_event_builders() {
        let event = StreamEvent::new(EventId::from("evt-1"), ActivityKind::QuoteSent, json!({}))
            .with_priority(Priority::High)
            .requiring_approval();
        assert_eq!(event.priority, Priority::High);
        assert!(event.requires_approval);
        assert_eq!(event.label(), "Quote sent");
        assert!(event.caused_by.is_none());
    }

    #[test]
    fn test_stream_event_serialization_skips_empty_cause() {
        let event = StreamEvent::new(EventId::from("evt-1"), ActivityKind::QuoteSent, json!({}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "quote_sent");
        assert_eq!(value["priority"], "normal");
        assert!(value.get("caused_by").is_none());
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(DashboardEvent::PendingCountChanged { count: 0 }).is_err());
        // Lossy variant swallows the same condition
        bus.emit_lossy(DashboardEvent::PendingCountChanged { count: 0 });
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(DashboardEvent::PendingCountChanged { count: 3 })
            .expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "PendingCountChanged");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "PendingCountChanged");
    }

    #[test]
    fn test_dashboard_event_tagged_serialization() {
        let value = serde_json::to_value(DashboardEvent::PendingCountChanged { count: 4 }).unwrap();
        assert_eq!(value["type"], "PendingCountChanged");
        assert_eq!(value["count"], 4);
    }
}
