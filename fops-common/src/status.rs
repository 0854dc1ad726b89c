//! Polled status surface
//!
//! The "connected managers" panel is refreshed on a fixed interval. Each
//! poll is tagged with a sequence number when it is issued; a result only
//! replaces the board if it is newer than the one already shown, so slow
//! or overlapping polls cannot roll the panel back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connector::ConnectionState;

/// One manager as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerPresence {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub active_agents: u32,
}

/// Wholesale status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub managers: Vec<ManagerPresence>,
    pub fetched_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(managers: Vec<ManagerPresence>) -> Self {
        Self {
            managers,
            fetched_at: Utc::now(),
        }
    }

    pub fn managers_connected(&self) -> usize {
        self.managers.iter().filter(|m| m.online).count()
    }
}

/// Latest accepted snapshot plus the sequence it was issued under
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    latest: Option<StatusSnapshot>,
    seq: u64,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot if `seq` is newer than the current one
    ///
    /// Returns false (and leaves the board unchanged) for stale results.
    pub fn replace(&mut self, seq: u64, snapshot: StatusSnapshot) -> bool {
        if self.latest.is_some() && seq <= self.seq {
            debug!(seq, current = self.seq, "Discarding stale status snapshot");
            return false;
        }
        self.seq = seq;
        self.latest = Some(snapshot);
        true
    }

    pub fn latest(&self) -> Option<&StatusSnapshot> {
        self.latest.as_ref()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn managers_connected(&self) -> usize {
        self.latest
            .as_ref()
            .map(StatusSnapshot::managers_connected)
            .unwrap_or(0)
    }
}

/// Read-only status values for presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStatus {
    pub connection: ConnectionState,
    pub pending_approvals: usize,
    pub managers_connected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(online: &[bool]) -> StatusSnapshot {
        StatusSnapshot::new(
            online
                .iter()
                .enumerate()
                .map(|(i, &online)| ManagerPresence {
                    id: format!("m{}", i),
                    name: format!("Manager {}", i),
                    online,
                    active_agents: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_first_snapshot_always_accepted() {
        let mut board = StatusBoard::new();
        assert!(board.replace(0, snapshot(&[true])));
        assert_eq!(board.managers_connected(), 1);
    }

    #[test]
    fn test_newer_snapshot_replaces_wholesale() {
        let mut board = StatusBoard::new();
        board.replace(1, snapshot(&[true, true, false]));
        assert!(board.replace(2, snapshot(&[false])));
        assert_eq!(board.latest().map(|s| s.managers.len()), Some(1));
        assert_eq!(board.managers_connected(), 0);
    }

    #[test]
    fn test_stale_snapshot_ignored() {
        let mut board = StatusBoard::new();
        board.replace(5, snapshot(&[true, true]));
        assert!(!board.replace(4, snapshot(&[])));
        assert!(!board.replace(5, snapshot(&[])));
        assert_eq!(board.seq(), 5);
        assert_eq!(board.managers_connected(), 2);
    }

    #[test]
    fn test_empty_board_reports_zero() {
        assert_eq!(StatusBoard::new().managers_connected(), 0);
    }
}
