//! Bounded SPMC work queue
//!
//! A fixed-capacity ring handing accepted client sockets from the accept
//! loop (single producer) to the worker threads (many consumers).
//!
//! ## Algorithm
//! `head` and `tail` are monotonically increasing 64-bit tickets; the slot
//! index is `ticket % capacity`. Capacity is a power of two, so it divides
//! the ticket domain evenly and wrap-around never aliases a live slot — the
//! 64-bit tickets also rule out ABA on the index. Consumers snapshot the
//! slot, then CAS-claim `head`; a failed CAS discards the snapshot and
//! retries after a pause hint.
//!
//! ## Layout
//! The mutex and condition variable of the blocking wait path live on their
//! own cache lines; `head` and `tail` share one line (they are true-shared
//! by design), separated from the slot storage.
//!
//! ## Ordering
//! A slot write happens-before any pop that observed the published `tail`:
//! the producer stores the slot, then publishes `tail` with release
//! ordering; consumers that suspect emptiness reload `tail` with acquire.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};

/// An owned, ready-to-serve client socket descriptor.
pub type WorkItem = std::os::fd::RawFd;

/// Ticket counters; true-shared on one cache line.
struct Tickets {
    /// Next ticket consumers will claim.
    head: AtomicU64,
    /// Next ticket the producer will publish.
    tail: AtomicU64,
}

/// The bounded single-producer / multi-consumer ring.
pub struct WorkQueue {
    /// Guards nothing but the sleep of `wait_not_empty`.
    wait_mutex: CachePadded<Mutex<()>>,

    /// Signalled once per push; waiters re-check the predicate.
    item_added: CachePadded<Condvar>,

    /// Ring storage. Slots hold raw descriptors widened to `u64` so the
    /// speculative snapshot in `pop` is an ordinary atomic load.
    slots: Box<[AtomicU64]>,

    tickets: CachePadded<Tickets>,
}

impl WorkQueue {
    /// Create a queue with the given capacity.
    ///
    /// The capacity must be a non-zero power of two so that slot indexing
    /// stays consistent across the `u64::MAX` wrap of the tickets.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "work queue capacity must be a power of two"
        );
        let slots = (0..capacity).map(|_| AtomicU64::new(0)).collect();
        WorkQueue {
            wait_mutex: CachePadded::new(Mutex::new(())),
            item_added: CachePadded::new(Condvar::new()),
            slots,
            tickets: CachePadded::new(Tickets {
                head: AtomicU64::new(0),
                tail: AtomicU64::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Signed occupancy from a head/tail pair; negative only for stale
    /// counter reads.
    fn size(head: u64, tail: u64) -> i64 {
        tail.wrapping_sub(head) as i64
    }

    fn index(&self, ticket: u64) -> usize {
        (ticket % self.slots.len() as u64) as usize
    }

    /// Publish one item and wake a waiter. Returns false when full.
    ///
    /// Single producer only: concurrent pushes race on the same slot.
    pub fn push(&self, item: WorkItem) -> bool {
        // a stale head only under-reports free space; re-read before
        // actually rejecting
        let mut head = self.tickets.head.load(Ordering::Relaxed);
        let tail = self.tickets.tail.load(Ordering::Relaxed);
        if Self::size(head, tail) >= self.capacity() as i64 {
            head = self.tickets.head.load(Ordering::Acquire);
            if Self::size(head, tail) >= self.capacity() as i64 {
                return false;
            }
        }

        self.slots[self.index(tail)].store(item as u32 as u64, Ordering::Relaxed);
        self.tickets.tail.store(tail.wrapping_add(1), Ordering::Release);

        // take the mutex so the signal cannot slip between a waiter's
        // predicate check and its sleep
        let guard = self.wait_mutex.lock();
        self.item_added.notify_one();
        drop(guard);
        true
    }

    /// Claim one item. Returns `None` when empty.
    pub fn pop(&self) -> Option<WorkItem> {
        loop {
            let head = self.tickets.head.load(Ordering::Relaxed);
            let mut tail = self.tickets.tail.load(Ordering::Relaxed);
            if Self::size(head, tail) <= 0 {
                tail = self.tickets.tail.load(Ordering::Acquire);
                if Self::size(head, tail) <= 0 {
                    return None;
                }
            }

            // Speculative read: if another consumer claimed this ticket the
            // CAS below fails and the snapshot is discarded, so a racing
            // overwrite of the slot is harmless.
            let snapshot = self.slots[self.index(head)].load(Ordering::Relaxed);
            if self
                .tickets
                .head
                .compare_exchange_weak(
                    head,
                    head.wrapping_add(1),
                    Ordering::Acquire,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return Some(snapshot as u32 as WorkItem);
            }

            std::hint::spin_loop();
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.tickets.head.load(Ordering::Acquire);
        let tail = self.tickets.tail.load(Ordering::Acquire);
        Self::size(head, tail) <= 0
    }

    /// Block until the queue is non-empty or `cancel` is raised.
    ///
    /// Spurious wakeups are absorbed by the predicate loop.
    pub fn wait_not_empty(&self, cancel: &AtomicBool) {
        let mut guard = self.wait_mutex.lock();
        while self.is_empty() && !cancel.load(Ordering::Relaxed) {
            self.item_added.wait(&mut guard);
        }
    }

    /// Wake every blocked waiter; used when shutdown raises the cancel
    /// flags.
    pub fn wake_all(&self) {
        let guard = self.wait_mutex.lock();
        self.item_added.notify_all();
        drop(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_rejects_non_power_of_two() {
        let _ = WorkQueue::with_capacity(100);
    }

    #[test]
    fn test_push_pop_single_thread() {
        let queue = WorkQueue::with_capacity(4);
        assert!(queue.is_empty());
        assert!(queue.push(11));
        assert!(queue.push(22));
        assert_eq!(queue.pop(), Some(11));
        assert_eq!(queue.pop(), Some(22));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_push_full_returns_false() {
        let queue = WorkQueue::with_capacity(2);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(!queue.push(3));
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.push(3));
    }
}
