//! Reply correlation
//!
//! Every correlated request parks a [`Ticket`] in the [`TicketTable`] under
//! its `MsgID` before the frame leaves the machine. The I/O thread fulfills
//! the ticket when the matching reply decodes; the calling thread sits in a
//! bounded wait on the other side. Teardown wakes every parked caller at
//! once instead of letting them ride out their timeouts.
//!
//! The rendezvous is a one-slot `std::sync::mpsc` channel: the table holds
//! the sender half, the caller's ticket holds the receiver. `recv_timeout`
//! gives the bounded wait, and dropping the sender side (or an explicit
//! cancel) wakes the caller early.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error};

use stagelink_core::envelope::Envelope;
use stagelink_core::types::MsgId;

// ----------------------------------------------------------------------------
// Msg Id Counter
// ----------------------------------------------------------------------------

/// Source of correlation ids, monotonically increasing from 1. Zero is the
/// reserved fire-and-forget id and is never produced.
#[derive(Debug)]
pub struct MsgIdCounter {
    next: AtomicU64,
}

impl MsgIdCounter {
    pub fn new() -> Self {
        MsgIdCounter {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> MsgId {
        MsgId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MsgIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Ticket
// ----------------------------------------------------------------------------

/// What a parked caller wakes up to.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The matching reply arrived within the timeout.
    Fulfilled(Envelope),
    /// The timeout elapsed first. The table entry is still live; the caller
    /// must [`TicketTable::discard`] it so a late reply finds nobody.
    TimedOut,
    /// The link or session tore down while the caller was parked.
    Cancelled,
}

enum TicketWake {
    Fulfilled(Box<Envelope>),
    Cancelled,
}

/// Waitable handle for one outstanding request. Created by
/// [`TicketTable::new_ticket`], consumed by [`Ticket::wait`].
pub struct Ticket {
    id: MsgId,
    cell: mpsc::Receiver<TicketWake>,
}

impl Ticket {
    pub fn id(&self) -> MsgId {
        self.id
    }

    /// Park the calling thread until the reply arrives, the timeout
    /// elapses, or the table cancels every waiter.
    pub fn wait(self, timeout: Duration) -> WaitOutcome {
        match self.cell.recv_timeout(timeout) {
            Ok(TicketWake::Fulfilled(envelope)) => WaitOutcome::Fulfilled(*envelope),
            Ok(TicketWake::Cancelled) => WaitOutcome::Cancelled,
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            // Sender gone without a wake message means the table entry was
            // discarded out from under us; treat it as a cancellation.
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Cancelled,
        }
    }
}

// ----------------------------------------------------------------------------
// Ticket Table
// ----------------------------------------------------------------------------

/// Registry of outstanding requests keyed by correlation id.
pub struct TicketTable {
    waiters: DashMap<MsgId, SyncSender<TicketWake>>,
}

impl TicketTable {
    pub fn new() -> Self {
        TicketTable {
            waiters: DashMap::new(),
        }
    }

    /// Register a waiter for `id`. Returns `None` for the fire-and-forget
    /// id and for an id that already has a live waiter; the latter is a
    /// counter bug, not a recoverable condition.
    pub fn new_ticket(&self, id: MsgId) -> Option<Ticket> {
        if !id.is_correlated() {
            debug_assert!(false, "ticket requested for fire-and-forget id");
            return None;
        }
        match self.waiters.entry(id) {
            Entry::Occupied(_) => {
                debug_assert!(false, "correlation id {id} already has a live ticket");
                error!(%id, "duplicate correlation id refused");
                None
            }
            Entry::Vacant(slot) => {
                let (wake_tx, wake_rx) = mpsc::sync_channel(1);
                slot.insert(wake_tx);
                Some(Ticket { id, cell: wake_rx })
            }
        }
    }

    /// Hand a decoded reply to the waiter parked under its id. Returns
    /// false when no waiter claims it (already timed out, or never ours).
    pub fn fulfill(&self, id: MsgId, envelope: Envelope) -> bool {
        match self.waiters.remove(&id) {
            Some((_, wake_tx)) => {
                // The slot is one deep and each sender fires once, so this
                // can only fail if the waiter already dropped its receiver.
                let _ = wake_tx.try_send(TicketWake::Fulfilled(Box::new(envelope)));
                true
            }
            None => {
                debug!(%id, "reply for unknown correlation id");
                false
            }
        }
    }

    /// Wake every parked waiter with a cancellation and empty the table.
    pub fn cancel_all(&self) {
        self.waiters.retain(|id, wake_tx| {
            debug!(%id, "cancelling outstanding request");
            let _ = wake_tx.try_send(TicketWake::Cancelled);
            false
        });
    }

    /// Drop the table entry for a request the caller has given up on.
    pub fn discard(&self, id: MsgId) {
        self.waiters.remove(&id);
    }

    pub fn outstanding(&self) -> usize {
        self.waiters.len()
    }
}

impl Default for TicketTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagelink_core::status::Status;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn reply(id: MsgId) -> Envelope {
        Envelope {
            command: "Take".into(),
            protocol_version: "1.0".into(),
            msg_id: id,
            status: Status::Ok,
            status_text: "OK".into(),
            payload: None,
        }
    }

    #[test]
    fn test_fulfill_wakes_only_the_matching_waiter() {
        let table = Arc::new(TicketTable::new());
        let first = table.new_ticket(MsgId::new(1)).unwrap();
        let second = table.new_ticket(MsgId::new(2)).unwrap();

        let table_clone = Arc::clone(&table);
        let fulfiller = thread::spawn(move || {
            table_clone.fulfill(MsgId::new(2), reply(MsgId::new(2)));
        });

        match second.wait(Duration::from_secs(1)) {
            WaitOutcome::Fulfilled(envelope) => assert_eq!(envelope.msg_id, MsgId::new(2)),
            other => panic!("expected fulfillment, got {other:?}"),
        }
        // The unrelated waiter saw nothing.
        match first.wait(Duration::from_millis(50)) {
            WaitOutcome::TimedOut => {}
            other => panic!("expected timeout, got {other:?}"),
        }
        fulfiller.join().unwrap();
        table.discard(MsgId::new(1));
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn test_wait_times_out_near_the_requested_bound() {
        let table = TicketTable::new();
        let ticket = table.new_ticket(MsgId::new(7)).unwrap();

        let started = Instant::now();
        let outcome = ticket.wait(Duration::from_millis(80));
        let elapsed = started.elapsed();

        assert!(matches!(outcome, WaitOutcome::TimedOut));
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_millis(800), "waited {elapsed:?}");
        // The entry survives a timeout until explicitly discarded.
        assert_eq!(table.outstanding(), 1);
        table.discard(MsgId::new(7));
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn test_cancel_all_wakes_every_waiter_promptly() {
        let table = Arc::new(TicketTable::new());
        let mut waiters = Vec::new();
        for id in 1..=4u64 {
            let ticket = table.new_ticket(MsgId::new(id)).unwrap();
            waiters.push(thread::spawn(move || {
                let started = Instant::now();
                let outcome = ticket.wait(Duration::from_secs(10));
                (outcome, started.elapsed())
            }));
        }

        // Give the waiters a moment to park before pulling the rug.
        thread::sleep(Duration::from_millis(30));
        table.cancel_all();

        for waiter in waiters {
            let (outcome, elapsed) = waiter.join().unwrap();
            assert!(matches!(outcome, WaitOutcome::Cancelled));
            assert!(elapsed < Duration::from_secs(2), "woke after {elapsed:?}");
        }
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn test_fulfill_after_discard_finds_no_waiter() {
        let table = TicketTable::new();
        let ticket = table.new_ticket(MsgId::new(3)).unwrap();
        assert!(matches!(
            ticket.wait(Duration::from_millis(10)),
            WaitOutcome::TimedOut
        ));
        table.discard(MsgId::new(3));

        // The late reply is unclaimed, not misdelivered.
        assert!(!table.fulfill(MsgId::new(3), reply(MsgId::new(3))));
    }

    #[test]
    fn test_counter_starts_at_one_and_increments() {
        let counter = MsgIdCounter::new();
        assert_eq!(counter.next(), MsgId::new(1));
        assert_eq!(counter.next(), MsgId::new(2));
        assert!(counter.next().is_correlated());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_duplicate_id_refused_in_release() {
        let table = TicketTable::new();
        let _held = table.new_ticket(MsgId::new(9)).unwrap();
        assert!(table.new_ticket(MsgId::new(9)).is_none());
    }
}
