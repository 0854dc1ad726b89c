//! Dashboard runtime actor
//!
//! One task owns the connector, approval gate, feed and status board and
//! applies [`Command`]s one at a time from an mpsc channel. Each command
//! runs to completion before the next, so mutable state needs no locks and
//! stream messages interleave with operator decisions only at command
//! boundaries.
//!
//! Everything that changes is announced on the [`EventBus`].

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fops_common::approval::{ApprovalGate, DecideOutcome, Decision, GateLimits, IngestOutcome};
use fops_common::connector::{AttemptId, ConnectionState, StreamConnector};
use fops_common::events::{DashboardEvent, EventBus, EventId, StreamEvent};
use fops_common::status::{DashboardStatus, StatusBoard, StatusSnapshot};
use fops_common::{Error, Result};

use crate::dispatch::DecisionDispatcher;

/// Command queue depth
const COMMAND_CAPACITY: usize = 256;

/// Work items processed by the runtime task
#[derive(Debug)]
pub enum Command {
    /// Start a connection attempt; replies with its id
    Connect { reply: oneshot::Sender<AttemptId> },
    Opened(AttemptId),
    Message { attempt: AttemptId, raw: String },
    Closed(AttemptId),
    Errored { attempt: AttemptId, error: String },
    Disconnect,
    Decide { id: EventId, decision: Decision },
    /// Locally produced notification (e.g. decision delivery result)
    Notice(StreamEvent),
    ReplaceStatus { seq: u64, snapshot: StatusSnapshot },
    Feed {
        limit: usize,
        reply: oneshot::Sender<Vec<StreamEvent>>,
    },
    Pending { reply: oneshot::Sender<Vec<StreamEvent>> },
    Status { reply: oneshot::Sender<DashboardStatus> },
    Snapshot { reply: oneshot::Sender<Option<StatusSnapshot>> },
}

/// A decision that took effect and may need reporting upstream
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub original_id: EventId,
    pub decision: Decision,
    pub resolution: StreamEvent,
}

/// Dashboard state, mutated only through `apply`
pub struct Dashboard {
    connector: StreamConnector,
    gate: ApprovalGate,
    status: StatusBoard,
    bus: EventBus,
    pending_tx: watch::Sender<usize>,
}

impl Dashboard {
    pub fn new(limits: GateLimits, bus: EventBus) -> Self {
        let (pending_tx, _) = watch::channel(0);
        Self {
            connector: StreamConnector::new(),
            gate: ApprovalGate::new(limits),
            status: StatusBoard::new(),
            bus,
            pending_tx,
        }
    }

    /// Observe connection state changes
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connector.subscribe()
    }

    /// Observe the pending-approval count
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.pending_tx.subscribe()
    }

    /// Apply one command; returns a decision that took effect, if any
    pub fn apply(&mut self, command: Command) -> Option<Resolution> {
        match command {
            Command::Connect { reply } => {
                let attempt = self.connector.connect();
                self.announce_connection();
                if reply.send(attempt).is_err() {
                    debug!(%attempt, "Connect requester went away");
                }
                None
            }
            Command::Opened(attempt) => {
                if self.connector.on_open(attempt) {
                    self.announce_connection();
                }
                None
            }
            Command::Message { attempt, raw } => {
                let event = self.connector.on_message(attempt, &raw)?;
                self.ingest(event)
            }
            Command::Closed(attempt) => {
                if self.connector.on_close(attempt) {
                    self.announce_connection();
                }
                None
            }
            Command::Errored { attempt, error } => {
                if self.connector.on_error(attempt, &error) {
                    self.announce_connection();
                }
                None
            }
            Command::Disconnect => {
                if self.connector.disconnect() {
                    self.announce_connection();
                }
                None
            }
            Command::Decide { id, decision } => self.decide(id, decision),
            Command::Notice(event) => {
                self.gate.record(event.clone());
                self.bus.emit_lossy(DashboardEvent::FeedEventAdded { event });
                None
            }
            Command::ReplaceStatus { seq, snapshot } => {
                if self.status.replace(seq, snapshot.clone()) {
                    self.bus
                        .emit_lossy(DashboardEvent::StatusSnapshotReplaced { snapshot });
                }
                None
            }
            Command::Feed { limit, reply } => {
                let _ = reply.send(self.gate.feed().recent(limit));
                None
            }
            Command::Pending { reply } => {
                let _ = reply.send(self.gate.pending().to_vec());
                None
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
                None
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.status.latest().cloned());
                None
            }
        }
    }

    pub fn status(&self) -> DashboardStatus {
        DashboardStatus {
            connection: self.connector.state(),
            pending_approvals: self.gate.pending_count(),
            managers_connected: self.status.managers_connected(),
        }
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    fn ingest(&mut self, event: StreamEvent) -> Option<Resolution> {
        let original_id = event.id.clone();
        match self.gate.ingest(event.clone()) {
            IngestOutcome::Delivered => {
                self.bus.emit_lossy(DashboardEvent::FeedEventAdded { event });
                None
            }
            IngestOutcome::Pending => {
                self.bus
                    .emit_lossy(DashboardEvent::ApprovalRequested { event });
                self.announce_pending();
                None
            }
            IngestOutcome::ResolvedOnArrival {
                decision,
                resolution,
            } => Some(self.announce_resolution(original_id, decision, resolution)),
            IngestOutcome::Duplicate => None,
        }
    }

    fn decide(&mut self, id: EventId, decision: Decision) -> Option<Resolution> {
        match self.gate.decide(&id, decision) {
            DecideOutcome::Resolved { resolution } => {
                let resolved = self.announce_resolution(id, decision, resolution);
                self.announce_pending();
                Some(resolved)
            }
            DecideOutcome::Deferred | DecideOutcome::Ignored => None,
        }
    }

    fn announce_resolution(
        &mut self,
        original_id: EventId,
        decision: Decision,
        resolution: StreamEvent,
    ) -> Resolution {
        self.bus.emit_lossy(DashboardEvent::ApprovalResolved {
            original_id: original_id.clone(),
            decision,
            resolution: resolution.clone(),
        });
        self.bus.emit_lossy(DashboardEvent::FeedEventAdded {
            event: resolution.clone(),
        });
        Resolution {
            original_id,
            decision,
            resolution,
        }
    }

    fn announce_connection(&self) {
        self.bus.emit_lossy(DashboardEvent::ConnectionStateChanged {
            state: self.connector.state(),
            timestamp: Utc::now(),
        });
    }

    fn announce_pending(&self) {
        let count = self.gate.pending_count();
        self.pending_tx.send_replace(count);
        self.bus
            .emit_lossy(DashboardEvent::PendingCountChanged { count });
    }
}

/// Cloneable sender side of the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    tx: mpsc::Sender<Command>,
}

fn stopped() -> Error {
    Error::Internal("dashboard runtime stopped".to_string())
}

impl RuntimeHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| stopped())
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn connect(&self) -> Result<AttemptId> {
        self.request(|reply| Command::Connect { reply }).await
    }

    pub async fn opened(&self, attempt: AttemptId) -> Result<()> {
        self.send(Command::Opened(attempt)).await
    }

    pub async fn message(&self, attempt: AttemptId, raw: String) -> Result<()> {
        self.send(Command::Message { attempt, raw }).await
    }

    pub async fn closed(&self, attempt: AttemptId) -> Result<()> {
        self.send(Command::Closed(attempt)).await
    }

    pub async fn errored(&self, attempt: AttemptId, error: String) -> Result<()> {
        self.send(Command::Errored { attempt, error }).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    /// Enqueue an operator decision; returns once queued
    pub async fn decide(&self, id: EventId, decision: Decision) -> Result<()> {
        self.send(Command::Decide { id, decision }).await
    }

    pub async fn notice(&self, event: StreamEvent) -> Result<()> {
        self.send(Command::Notice(event)).await
    }

    pub async fn replace_status(&self, seq: u64, snapshot: StatusSnapshot) -> Result<()> {
        self.send(Command::ReplaceStatus { seq, snapshot }).await
    }

    pub async fn feed(&self, limit: usize) -> Result<Vec<StreamEvent>> {
        self.request(|reply| Command::Feed { limit, reply }).await
    }

    pub async fn pending(&self) -> Result<Vec<StreamEvent>> {
        self.request(|reply| Command::Pending { reply }).await
    }

    pub async fn status(&self) -> Result<DashboardStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Latest accepted manager presence snapshot
    pub async fn snapshot(&self) -> Result<Option<StatusSnapshot>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}

/// Spawn the runtime task
///
/// The task disconnects the stream and exits when `cancel` fires or every
/// handle is dropped.
pub fn spawn_runtime(
    limits: GateLimits,
    bus: EventBus,
    dispatcher: Option<DecisionDispatcher>,
    cancel: CancellationToken,
) -> (RuntimeHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(COMMAND_CAPACITY);
    let handle = RuntimeHandle { tx };
    let notices = handle.clone();
    let mut dashboard = Dashboard::new(limits, bus);

    let task = tokio::spawn(async move {
        info!("Dashboard runtime started");
        loop {
            let command = tokio::select! {
                _ = cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            if let Some(resolution) = dashboard.apply(command) {
                if let Some(dispatcher) = &dispatcher {
                    dispatcher.dispatch(resolution, notices.clone());
                }
            }
        }

        if dashboard.connector.disconnect() {
            dashboard.announce_connection();
        }
        if dashboard.gate.pending_count() > 0 {
            warn!(
                pending = dashboard.gate.pending_count(),
                "Runtime stopping with undecided approvals"
            );
        }
        info!("Dashboard runtime stopped");
    });

    (handle, task)
}
