//! Wait queue: connections seeking a partner, FIFO order.

use std::collections::VecDeque;

use tsugai_shared::time::now_unix_millis;

use super::{ConnectionId, DisplayName};

/// One connection waiting for a partner.
#[derive(Debug, Clone)]
pub struct WaitEntry {
    pub connection_id: ConnectionId,
    pub display_name: DisplayName,
    /// When the entry was enqueued (Unix ms). Diagnostics only.
    pub enqueued_at: i64,
}

impl WaitEntry {
    pub fn new(connection_id: ConnectionId, display_name: DisplayName) -> Self {
        Self {
            connection_id,
            display_name,
            enqueued_at: now_unix_millis(),
        }
    }
}

/// Ordered set of connections seeking a partner.
///
/// Entries are appended in arrival order and removed only by match,
/// cancel or disconnect, so a front-to-back scan is oldest-first. A
/// connection id appears at most once.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<WaitEntry>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Ignored if the connection is already queued.
    pub fn enqueue(&mut self, entry: WaitEntry) {
        if self.contains(&entry.connection_id) {
            return;
        }
        self.entries.push_back(entry);
    }

    /// Remove the entry for `connection_id`, if present.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.connection_id != *connection_id);
        self.entries.len() != before
    }

    /// Remove and return the first entry whose connection id differs from
    /// `requester` (oldest-waiting-first selection).
    pub fn claim_partner(&mut self, requester: &ConnectionId) -> Option<WaitEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.connection_id != *requester)?;
        self.entries.remove(index)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.entries
            .iter()
            .any(|e| e.connection_id == *connection_id)
    }

    /// Enqueue time of the front (longest-waiting) entry.
    pub fn oldest_enqueued_at(&self) -> Option<i64> {
        self.entries.front().map(|e| e.enqueued_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
