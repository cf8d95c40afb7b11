//! Live subscribers and their bounded delivery queues.
//!
//! This module provides:
//! - [`SubscriberRegistry`] - The set of active per-viewer queues
//! - [`Subscription`] - Consumer handle owned by one viewer session
//! - [`OverflowPolicy`] - What a full queue does with a new entry
//!
//! Pushing into a queue never blocks: when a viewer falls behind, entries are
//! dropped for that viewer only and ingestion carries on.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::entry::LogEntry;
use crate::error::{LogError, Result};

/// Identifier of a subscriber, unique within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a full subscriber queue does when another entry arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Skip the incoming entry for this subscriber.
    #[default]
    DropNewest,
    /// Discard the oldest queued entry to make room, so the queue holds the
    /// most recent run of entries.
    DropOldest,
}

/// Result of a non-blocking push into one subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The entry was queued.
    Delivered,
    /// The queue was full and the entry was skipped.
    Dropped,
    /// The consumer is gone; the queue should be pruned.
    Closed,
}

/// Counts from one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Subscribers that received the entry.
    pub delivered: usize,
    /// Subscribers that skipped it because their queue was full.
    pub dropped: usize,
    /// Closed subscribers removed during the pass.
    pub pruned: usize,
}

/// Shared state between the registry (producer) and one [`Subscription`].
struct SubscriberQueue {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    policy: OverflowPolicy,
    notify: Notify,
    /// Set when the consumer handle is dropped.
    closed: AtomicBool,
    /// Set when the registry stops feeding this queue.
    detached: AtomicBool,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            policy,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    fn push_or_drop(&self, entry: &LogEntry) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }

        {
            let mut queue = self.entries.lock();
            if queue.len() >= self.capacity {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                match self.policy {
                    OverflowPolicy::DropNewest => return PushOutcome::Dropped,
                    OverflowPolicy::DropOldest => {
                        queue.pop_front();
                    }
                }
            }
            queue.push_back(entry.clone());
        }

        self.notify.notify_one();
        PushOutcome::Delivered
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Consumer side of one subscriber queue.
///
/// Dropping the handle closes the queue; the registry removes it on the next
/// fan-out even if [`SubscriberRegistry::remove`] is never called.
pub struct Subscription {
    id: SubscriberId,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// The subscriber's identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next entry.
    ///
    /// Returns `None` once the subscription has been removed from its
    /// registry and every entry queued before removal has been received.
    pub async fn recv(&mut self) -> Option<LogEntry> {
        loop {
            let next = self.queue.entries.lock().pop_front();
            if next.is_some() {
                return next;
            }
            if self.queue.detached.load(Ordering::Acquire) {
                return None;
            }
            // notify_one stores a permit, so a push between the checks above
            // and this await is not lost.
            self.queue.notify.notified().await;
        }
    }

    /// Takes the next entry without waiting.
    pub fn try_recv(&mut self) -> Option<LogEntry> {
        self.queue.entries.lock().pop_front()
    }

    /// Number of entries currently waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.entries.lock().len()
    }

    /// Entries lost to overflow since the subscription was created.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    /// Queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.closed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("capacity", &self.queue.capacity)
            .field("pending", &self.pending())
            .finish()
    }
}

/// The set of live subscriber queues.
///
/// The registry is not synchronized on its own; the intake engine keeps it
/// behind the same lock as the ring buffer.
#[derive(Default)]
pub struct SubscriberRegistry {
    queues: HashMap<SubscriberId, Arc<SubscriberQueue>>,
    next_id: u64,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber queue and returns its consumer handle.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidCapacity`] if `capacity` is zero.
    pub fn add(&mut self, capacity: usize, policy: OverflowPolicy) -> Result<Subscription> {
        if capacity == 0 {
            return Err(LogError::InvalidCapacity {
                what: "subscriber queue",
                value: capacity,
            });
        }

        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        let queue = Arc::new(SubscriberQueue::new(capacity, policy));
        self.queues.insert(id, Arc::clone(&queue));

        debug!(subscriber = %id, capacity, ?policy, "subscriber added");
        Ok(Subscription { id, queue })
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        match self.queues.remove(&id) {
            Some(queue) => {
                queue.detach();
                debug!(subscriber = %id, "subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Offers `entry` to every subscriber without blocking.
    ///
    /// Full queues skip the entry according to their policy; queues whose
    /// consumer has gone away are removed.
    pub fn push_or_drop(&mut self, entry: &LogEntry) -> FanoutReport {
        let mut report = FanoutReport::default();

        self.queues.retain(|id, queue| match queue.push_or_drop(entry) {
            PushOutcome::Delivered => {
                report.delivered += 1;
                true
            }
            PushOutcome::Dropped => {
                trace!(subscriber = %id, "subscriber queue full, entry dropped");
                report.dropped += 1;
                true
            }
            PushOutcome::Closed => {
                debug!(subscriber = %id, "subscriber closed, pruning");
                report.pruned += 1;
                false
            }
        });

        report
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Returns true if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

impl Drop for SubscriberRegistry {
    fn drop(&mut self) {
        for queue in self.queues.values() {
            queue.detach();
        }
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.queues.len())
            .finish()
    }
}
