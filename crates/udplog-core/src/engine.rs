//! The log intake engine.
//!
//! [`IntakeEngine`] owns the ring buffer, the subscriber registry and the file
//! writer behind one lock. Every mutation takes that lock, so an ingested
//! entry is buffered, fanned out and persisted as one step and readers never
//! observe a half-applied append.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::entry::LogEntry;
use crate::error::{LogError, Result};
use crate::file_writer::FileWriter;
use crate::ring::RingBuffer;
use crate::subscriber::{OverflowPolicy, SubscriberId, SubscriberRegistry, Subscription};
use crate::traits::EntryForwarder;

/// Default ring buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Default per-subscriber queue capacity.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 1000;

/// Configuration for the intake engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of recent entries kept in memory.
    pub buffer_capacity: usize,
    /// Directory for day files; `None` disables persistence.
    pub log_dir: Option<PathBuf>,
    /// Queue capacity used by [`IntakeEngine::subscribe_default`].
    pub subscriber_queue_capacity: usize,
    /// Overflow behaviour of subscriber queues.
    pub overflow_policy: OverflowPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            log_dir: None,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a config with the given buffer capacity and no persistence.
    #[must_use]
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity,
            ..Self::default()
        }
    }

    /// Enables persistence into `dir`.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Sets the default subscriber queue capacity.
    #[must_use]
    pub const fn with_subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity;
        self
    }

    /// Sets the subscriber overflow policy.
    #[must_use]
    pub const fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}

/// State guarded by the engine lock.
struct Core {
    ring: RingBuffer,
    subscribers: SubscriberRegistry,
    writer: Option<FileWriter>,
}

/// Coordinates ingestion, live fan-out and persistence.
pub struct IntakeEngine {
    config: EngineConfig,
    core: Mutex<Core>,
    forwarder: Option<Arc<dyn EntryForwarder>>,
}

impl IntakeEngine {
    /// Creates an engine, creating the log directory if persistence is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created or the default
    /// subscriber queue capacity is zero.
    pub fn new(config: EngineConfig) -> Result<Self> {
        if config.subscriber_queue_capacity == 0 {
            return Err(LogError::InvalidCapacity {
                what: "subscriber queue",
                value: 0,
            });
        }

        let writer = match &config.log_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Some(FileWriter::new(dir))
            }
            None => None,
        };

        debug!(
            buffer_capacity = config.buffer_capacity,
            persistence = writer.is_some(),
            "intake engine created"
        );

        Ok(Self {
            core: Mutex::new(Core {
                ring: RingBuffer::new(config.buffer_capacity),
                subscribers: SubscriberRegistry::new(),
                writer,
            }),
            config,
            forwarder: None,
        })
    }

    /// Attaches a forwarder that sees every ingested entry.
    #[must_use]
    pub fn with_forwarder(mut self, forwarder: Arc<dyn EntryForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Ingests one message stamped with the current time.
    ///
    /// Trailing newlines are stripped. Returns `None` and records nothing if
    /// the message is empty afterwards.
    pub fn add_entry(&self, message: &str) -> Option<LogEntry> {
        self.ingest(message, None)
    }

    /// Ingests one message with an explicit arrival time.
    pub fn add_entry_at(&self, message: &str, timestamp: DateTime<Utc>) -> Option<LogEntry> {
        self.ingest(message, Some(timestamp))
    }

    fn ingest(&self, message: &str, timestamp: Option<DateTime<Utc>>) -> Option<LogEntry> {
        let message = message.trim_end_matches('\n');
        if message.is_empty() {
            trace!("empty message ignored");
            return None;
        }

        let entry = {
            let mut core = self.core.lock();
            // Stamped under the lock: arrival order, buffer order and file
            // order are the same, and file dates never go backwards.
            let entry = LogEntry::new(timestamp.unwrap_or_else(Utc::now), message);

            core.ring.push(entry.clone());

            let report = core.subscribers.push_or_drop(&entry);
            if report.dropped > 0 {
                trace!(dropped = report.dropped, "slow subscribers skipped entry");
            }

            if let Some(writer) = core.writer.as_mut() {
                if let Err(e) = writer.write(&entry) {
                    warn!(error = %e, dir = %writer.dir().display(), "failed to persist log entry");
                }
            }
            entry
        };

        if let Some(forwarder) = &self.forwarder {
            forwarder.forward(&entry);
        }
        Some(entry)
    }

    /// Returns up to `limit` of the most recent entries, oldest first.
    #[must_use]
    pub fn get_recent(&self, limit: usize) -> Vec<LogEntry> {
        self.core.lock().ring.recent(limit)
    }

    /// Opens a subscription with the given queue capacity.
    ///
    /// The subscription sees every entry ingested after this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidCapacity`] if `capacity` is zero.
    pub fn subscribe(&self, capacity: usize) -> Result<Subscription> {
        self.core
            .lock()
            .subscribers
            .add(capacity, self.config.overflow_policy)
    }

    /// Opens a subscription with the configured default capacity.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configured capacity is invalid.
    pub fn subscribe_default(&self) -> Result<Subscription> {
        self.subscribe(self.config.subscriber_queue_capacity)
    }

    /// Removes a subscription. Entries already queued stay receivable.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.core.lock().subscribers.remove(id)
    }

    /// Empties the ring buffer. Files and queued notifications are untouched.
    pub fn clear_buffer(&self) {
        self.core.lock().ring.clear();
        debug!("ring buffer cleared");
    }

    /// Flushes and closes the current log file.
    ///
    /// A later ingest reopens the day file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> Result<()> {
        match self.core.lock().writer.as_mut() {
            Some(writer) => writer.close(),
            None => Ok(()),
        }
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.lock().ring.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.lock().ring.is_empty()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.core.lock().subscribers.len()
    }

    /// Returns true if entries are written to disk.
    #[must_use]
    pub const fn persistence_enabled(&self) -> bool {
        self.config.log_dir.is_some()
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl fmt::Debug for IntakeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeEngine")
            .field("config", &self.config)
            .field("forwarder", &self.forwarder.as_ref().map(|fw| fw.name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Shared engine handle.
pub type SharedEngine = Arc<IntakeEngine>;
