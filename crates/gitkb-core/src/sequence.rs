//! Stale-response guard for concurrent fetches.
//!
//! Every fetch takes a [`Ticket`] from a [`RequestSequencer`] before it
//! starts. When it resolves it publishes into [`LatestResults`], which only
//! accepts the value if no newer ticket has been issued in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Position of a request in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    last: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is the newest one issued.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.last.load(Ordering::SeqCst) == ticket.0
    }
}

/// Holds the most recent accepted result.
#[derive(Debug)]
pub struct LatestResults<T> {
    sequencer: RequestSequencer,
    slot: Mutex<Option<(Ticket, T)>>,
}

impl<T: Clone> Default for LatestResults<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LatestResults<T> {
    pub fn new() -> Self {
        Self {
            sequencer: RequestSequencer::new(),
            slot: Mutex::new(None),
        }
    }

    pub fn begin(&self) -> Ticket {
        self.sequencer.issue()
    }

    /// Stores `value` if `ticket` is still the newest issued. Returns whether
    /// it was accepted.
    pub fn publish(&self, ticket: Ticket, value: T) -> bool {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Checked under the lock so two resolving requests cannot interleave.
        if !self.sequencer.is_current(ticket) {
            tracing::debug!(ticket = ticket.0, "discarding superseded response");
            return false;
        }
        *slot = Some((ticket, value));
        true
    }

    pub fn current(&self) -> Option<T> {
        let slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref().map(|(_, v)| v.clone())
    }

    pub fn current_ticket(&self) -> Option<Ticket> {
        let slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref().map(|(t, _)| *t)
    }
}
