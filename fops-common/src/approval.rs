//! Approval gate and live feed
//!
//! Gated stream events are held in an ordered pending set until an operator
//! approves or rejects them. A decision never edits the original event: it
//! removes the event from the pending set and appends a new synthetic
//! confirmation or rejection to the feed, linked back via `caused_by`.
//!
//! Decisions may reach the gate before the event they refer to (the
//! operator acts on an id the upstream has announced but the stream has
//! not delivered yet). Such decisions are buffered and applied on arrival,
//! so either ordering converges on one pending set and one resolution.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::events::{ActivityKind, EventId, StreamEvent};

/// Default number of feed entries retained
pub const DEFAULT_FEED_CAPACITY: usize = 200;
/// Default size of the duplicate-delivery window
pub const DEFAULT_DEDUP_WINDOW: usize = 1024;
/// Default number of buffered early decisions
pub const DEFAULT_EARLY_DECISION_LIMIT: usize = 64;
/// Default number of decided ids remembered against replays
pub const DEFAULT_RESOLVED_WINDOW: usize = 4096;

/// Operator verdict on a gated event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// Kind of the synthetic event this decision produces
    pub const fn resolution_kind(self) -> ActivityKind {
        match self {
            Decision::Approved => ActivityKind::ApprovalConfirmed,
            Decision::Rejected => ActivityKind::ApprovalRejected,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the synthetic feed event recording `decision` on `original`
///
/// Fresh id, stamped now, never gated, `caused_by` the original. The
/// original's kind and payload are carried in the payload so the feed
/// entry stands on its own.
pub fn resolution_event(original: &StreamEvent, decision: Decision) -> StreamEvent {
    StreamEvent {
        id: EventId::generate(),
        kind: decision.resolution_kind(),
        priority: original.priority,
        timestamp: Utc::now(),
        payload: json!({
            "decision": decision.as_str(),
            "original_id": original.id,
            "original_kind": original.kind,
            "original_payload": original.payload,
        }),
        requires_approval: false,
        caused_by: Some(original.id.clone()),
    }
}

/// Bounded, newest-first list of events shown to the operator
#[derive(Debug, Clone)]
pub struct EventFeed {
    events: VecDeque<StreamEvent>,
    capacity: usize,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add at the newest end, evicting the oldest past capacity
    pub fn push(&mut self, event: StreamEvent) {
        self.events.push_front(event);
        if self.events.len() > self.capacity {
            self.events.pop_back();
        }
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &StreamEvent> {
        self.events.iter()
    }

    pub fn newest(&self) -> Option<&StreamEvent> {
        self.events.front()
    }

    /// Up to `limit` newest events, cloned
    pub fn recent(&self, limit: usize) -> Vec<StreamEvent> {
        self.events.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Bounded set of recently seen ids; the oldest id is forgotten first
#[derive(Debug, Clone)]
pub struct RecentIds {
    set: HashSet<EventId>,
    order: VecDeque<EventId>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `id`; false if it was already present
    pub fn insert(&mut self, id: &EventId) -> bool {
        if !self.set.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id.clone());
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.set.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// What happened to an ingested event
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Not gated; appended to the feed
    Delivered,
    /// Gated; added to the pending set
    Pending,
    /// Gated, but a decision was already waiting; the resolution went to the feed
    ResolvedOnArrival {
        decision: Decision,
        resolution: StreamEvent,
    },
    /// Id already seen; dropped
    Duplicate,
}

/// What happened to a decision
#[derive(Debug, Clone, PartialEq)]
pub enum DecideOutcome {
    /// Pending event resolved; the resolution went to the feed
    Resolved { resolution: StreamEvent },
    /// Event not seen yet; decision held until it arrives
    Deferred,
    /// Already decided, never gated, or a conflicting early decision exists
    Ignored,
}

/// Gate sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateLimits {
    pub feed_capacity: usize,
    pub dedup_window: usize,
    pub early_decision_limit: usize,
    /// Decided ids only; ungated traffic never evicts these
    pub resolved_window: usize,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            feed_capacity: DEFAULT_FEED_CAPACITY,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            early_decision_limit: DEFAULT_EARLY_DECISION_LIMIT,
            resolved_window: DEFAULT_RESOLVED_WINDOW,
        }
    }
}

/// Pending-approval set, early-decision buffer and feed
///
/// Plain data with `&mut self` methods: one owner drives it, so there is no
/// interleaving between checking and mutating the pending set.
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    /// Arrival order
    pending: Vec<StreamEvent>,
    early: VecDeque<(EventId, Decision)>,
    early_limit: usize,
    seen: RecentIds,
    resolved: RecentIds,
    feed: EventFeed,
}

impl ApprovalGate {
    pub fn new(limits: GateLimits) -> Self {
        Self {
            pending: Vec::new(),
            early: VecDeque::new(),
            early_limit: limits.early_decision_limit.max(1),
            seen: RecentIds::new(limits.dedup_window),
            resolved: RecentIds::new(limits.resolved_window),
            feed: EventFeed::new(limits.feed_capacity),
        }
    }

    /// Route one stream event into the feed or the pending set
    ///
    /// The pending set stays keyed by id: a replay of an id that is pending
    /// or already decided is a duplicate regardless of the recent-id window.
    pub fn ingest(&mut self, event: StreamEvent) -> IngestOutcome {
        let replayed = self.is_pending(&event.id) || self.resolved.contains(&event.id);
        if !self.seen.insert(&event.id) || replayed {
            debug!(event_id = %event.id, "Duplicate delivery dropped");
            return IngestOutcome::Duplicate;
        }

        if !event.requires_approval {
            self.feed.push(event);
            return IngestOutcome::Delivered;
        }

        if let Some(decision) = self.take_early(&event.id) {
            info!(event_id = %event.id, %decision, "Applying decision recorded before arrival");
            let resolution = resolution_event(&event, decision);
            self.resolved.insert(&event.id);
            self.feed.push(resolution.clone());
            return IngestOutcome::ResolvedOnArrival {
                decision,
                resolution,
            };
        }

        debug!(event_id = %event.id, kind = ?event.kind, "Event awaiting approval");
        self.pending.push(event);
        IngestOutcome::Pending
    }

    /// Apply an operator decision to `id`
    ///
    /// Idempotent: a second decision on the same id leaves the pending set
    /// and feed untouched.
    pub fn decide(&mut self, id: &EventId, decision: Decision) -> DecideOutcome {
        if let Some(pos) = self.pending.iter().position(|e| &e.id == id) {
            let original = self.pending.remove(pos);
            let resolution = resolution_event(&original, decision);
            info!(event_id = %id, %decision, "Approval decided");
            self.resolved.insert(id);
            self.feed.push(resolution.clone());
            return DecideOutcome::Resolved { resolution };
        }

        if self.seen.contains(id) || self.resolved.contains(id) {
            debug!(event_id = %id, %decision, "Decision on event that is not pending ignored");
            return DecideOutcome::Ignored;
        }

        if self.early.iter().any(|(early_id, _)| early_id == id) {
            debug!(event_id = %id, %decision, "Event already has a buffered decision");
            return DecideOutcome::Ignored;
        }

        debug!(event_id = %id, %decision, "Decision recorded ahead of event");
        self.early.push_back((id.clone(), decision));
        if self.early.len() > self.early_limit {
            if let Some((dropped, _)) = self.early.pop_front() {
                debug!(event_id = %dropped, "Early decision buffer full, oldest dropped");
            }
        }
        DecideOutcome::Deferred
    }

    /// Append a locally produced, ungated event straight to the feed
    pub fn record(&mut self, event: StreamEvent) {
        self.seen.insert(&event.id);
        self.feed.push(event);
    }

    fn take_early(&mut self, id: &EventId) -> Option<Decision> {
        let pos = self.early.iter().position(|(early_id, _)| early_id == id)?;
        self.early.remove(pos).map(|(_, decision)| decision)
    }

    /// Pending events in arrival order
    pub fn pending(&self) -> &[StreamEvent] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &EventId) -> bool {
        self.pending.iter().any(|e| &e.id == id)
    }

    /// Decisions waiting for their event
    pub fn early_decisions(&self) -> usize {
        self.early.len()
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new(GateLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gated(id: &str) -> StreamEvent {
        StreamEvent::new(EventId::from(id), ActivityKind::QuoteSent, json!({"amount": 1200}))
            .requiring_approval()
    }

    fn plain(id: &str) -> StreamEvent {
        StreamEvent::new(EventId::from(id), ActivityKind::JobDispatched, json!({}))
    }

    #[test]
    fn test_ungated_event_goes_to_feed() {
        let mut gate = ApprovalGate::default();
        assert_eq!(gate.ingest(plain("a")), IngestOutcome::Delivered);
        assert_eq!(gate.pending_count(), 0);
        assert_eq!(gate.feed().len(), 1);
    }

    #[test]
    fn test_gated_events_keep_arrival_order() {
        let mut gate = ApprovalGate::default();
        gate.ingest(gated("a"));
        gate.ingest(gated("b"));
        gate.ingest(gated("c"));
        let ids: Vec<&str> = gate.pending().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(gate.feed().is_empty());
    }

    #[test]
    fn test_approve_appends_confirmation_linked_to_original() {
        let mut gate = ApprovalGate::default();
        gate.ingest(gated("a"));

        let outcome = gate.decide(&EventId::from("a"), Decision::Approved);
        let DecideOutcome::Resolved { resolution } = outcome else {
            panic!("expected resolution, got {:?}", outcome);
        };

        assert_eq!(resolution.kind, ActivityKind::ApprovalConfirmed);
        assert_eq!(resolution.caused_by, Some(EventId::from("a")));
        assert_ne!(resolution.id, EventId::from("a"));
        assert!(!resolution.requires_approval);
        assert_eq!(resolution.payload["original_kind"], "quote_sent");
        assert_eq!(resolution.payload["original_payload"]["amount"], 1200);
        assert_eq!(gate.pending_count(), 0);
        assert_eq!(gate.feed().newest(), Some(&resolution));
    }

    #[test]
    fn test_reject_produces_rejection() {
        let mut gate = ApprovalGate::default();
        gate.ingest(gated("a"));
        match gate.decide(&EventId::from("a"), Decision::Rejected) {
            DecideOutcome::Resolved { resolution } => {
                assert_eq!(resolution.kind, ActivityKind::ApprovalRejected)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_second_decision_is_noop() {
        let mut gate = ApprovalGate::default();
        gate.ingest(gated("a"));
        gate.decide(&EventId::from("a"), Decision::Approved);
        let feed_len = gate.feed().len();

        assert_eq!(
            gate.decide(&EventId::from("a"), Decision::Rejected),
            DecideOutcome::Ignored
        );
        assert_eq!(gate.feed().len(), feed_len);
        assert_eq!(gate.pending_count(), 0);
    }

    #[test]
    fn test_decision_on_ungated_event_ignored() {
        let mut gate = ApprovalGate::default();
        gate.ingest(plain("a"));
        assert_eq!(
            gate.decide(&EventId::from("a"), Decision::Approved),
            DecideOutcome::Ignored
        );
        assert_eq!(gate.feed().len(), 1);
    }

    #[test]
    fn test_early_decision_applied_on_arrival() {
        let mut gate = ApprovalGate::default();
        assert_eq!(
            gate.decide(&EventId::from("a"), Decision::Approved),
            DecideOutcome::Deferred
        );
        assert!(gate.feed().is_empty());

        match gate.ingest(gated("a")) {
            IngestOutcome::ResolvedOnArrival {
                decision,
                resolution,
            } => {
                assert_eq!(decision, Decision::Approved);
                assert_eq!(resolution.caused_by, Some(EventId::from("a")));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(gate.pending_count(), 0);
        assert_eq!(gate.early_decisions(), 0);
        assert_eq!(gate.feed().len(), 1);
    }

    #[test]
    fn test_conflicting_early_decision_ignored() {
        let mut gate = ApprovalGate::default();
        gate.decide(&EventId::from("a"), Decision::Approved);
        assert_eq!(
            gate.decide(&EventId::from("a"), Decision::Rejected),
            DecideOutcome::Ignored
        );
        assert_eq!(gate.early_decisions(), 1);
    }

    #[test]
    fn test_early_decision_buffer_is_bounded() {
        let mut gate = ApprovalGate::new(GateLimits {
            early_decision_limit: 2,
            ..GateLimits::default()
        });
        for id in ["a", "b", "c"] {
            gate.decide(&EventId::from(id), Decision::Approved);
        }
        assert_eq!(gate.early_decisions(), 2);
        // Oldest decision was dropped, so "a" waits for an operator again
        assert_eq!(gate.ingest(gated("a")), IngestOutcome::Pending);
    }

    #[test]
    fn test_duplicate_delivery_dropped() {
        let mut gate = ApprovalGate::default();
        gate.ingest(gated("a"));
        assert_eq!(gate.ingest(gated("a")), IngestOutcome::Duplicate);
        assert_eq!(gate.pending_count(), 1);
    }

    fn small_window() -> ApprovalGate {
        ApprovalGate::new(GateLimits {
            dedup_window: 2,
            ..GateLimits::default()
        })
    }

    #[test]
    fn test_replay_of_pending_id_after_window_eviction_is_duplicate() {
        let mut gate = small_window();
        gate.ingest(gated("x"));
        gate.ingest(plain("a"));
        gate.ingest(plain("b"));

        assert_eq!(gate.ingest(gated("x")), IngestOutcome::Duplicate);
        assert_eq!(gate.pending_count(), 1);

        let first = gate.decide(&EventId::from("x"), Decision::Approved);
        let second = gate.decide(&EventId::from("x"), Decision::Approved);
        assert!(matches!(first, DecideOutcome::Resolved { .. }));
        assert_eq!(second, DecideOutcome::Ignored);

        let confirmations = gate
            .feed()
            .iter()
            .filter(|e| e.kind == ActivityKind::ApprovalConfirmed)
            .count();
        assert_eq!(confirmations, 1);
    }

    #[test]
    fn test_replay_of_decided_id_after_window_eviction_stays_resolved() {
        let mut gate = small_window();
        gate.ingest(gated("x"));
        gate.decide(&EventId::from("x"), Decision::Rejected);
        gate.ingest(plain("a"));
        gate.ingest(plain("b"));
        gate.record(plain("c"));

        assert_eq!(gate.ingest(gated("x")), IngestOutcome::Duplicate);
        assert_eq!(gate.pending_count(), 0);
        assert!(!gate.is_pending(&EventId::from("x")));
        assert_eq!(
            gate.decide(&EventId::from("x"), Decision::Approved),
            DecideOutcome::Ignored
        );
    }

    #[test]
    fn test_early_resolution_remembered_against_replay() {
        let mut gate = small_window();
        gate.decide(&EventId::from("x"), Decision::Approved);
        gate.ingest(gated("x"));
        gate.ingest(plain("a"));
        gate.ingest(plain("b"));

        assert_eq!(gate.ingest(gated("x")), IngestOutcome::Duplicate);
        assert_eq!(gate.pending_count(), 0);
        assert_eq!(gate.feed().len(), 3);
    }

    #[test]
    fn test_feed_newest_first_and_bounded() {
        let mut feed = EventFeed::new(2);
        feed.push(plain("a"));
        feed.push(plain("b"));
        feed.push(plain("c"));
        let ids: Vec<&str> = feed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(feed.recent(1).len(), 1);
    }

    #[test]
    fn test_recent_ids_forget_oldest() {
        let mut ids = RecentIds::new(2);
        assert!(ids.insert(&EventId::from("a")));
        assert!(ids.insert(&EventId::from("b")));
        assert!(!ids.insert(&EventId::from("b")));
        assert!(ids.insert(&EventId::from("c")));
        assert!(!ids.contains(&EventId::from("a")));
        assert_eq!(ids.len(), 2);
    }
}
