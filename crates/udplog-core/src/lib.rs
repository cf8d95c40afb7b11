//! # udplog-core
//!
//! In-process core of the udplog intake engine.
//!
//! This crate provides:
//!
//! - [`LogEntry`]: a timestamped text line
//! - [`RingBuffer`]: bounded store of the most recent entries
//! - [`SubscriberRegistry`] and [`Subscription`]: bounded per-consumer queues
//! - [`FileWriter`]: date-partitioned append-only files
//! - [`RetentionSweeper`]: periodic deletion of expired day files
//! - [`IntakeEngine`]: ties the above together behind one lock
//! - [`EntryForwarder`]: hook for side-channel delivery
//!
//! ## Example
//!
//! ```rust
//! use udplog_core::{EngineConfig, IntakeEngine};
//!
//! let engine = IntakeEngine::new(EngineConfig::new(100)).unwrap();
//! let mut live = engine.subscribe(10).unwrap();
//!
//! engine.add_entry("service started\n");
//!
//! assert_eq!(engine.get_recent(10).len(), 1);
//! assert_eq!(live.try_recv().unwrap().message(), "service started");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod entry;
pub mod error;
pub mod file_writer;
pub mod retention;
pub mod ring;
pub mod subscriber;
pub mod traits;

pub use engine::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_SUBSCRIBER_QUEUE_CAPACITY, EngineConfig, IntakeEngine,
    SharedEngine,
};
pub use entry::LogEntry;
pub use error::{LogError, Result};
pub use file_writer::{FileWriter, LOG_FILE_DATE_FORMAT, LOG_FILE_EXTENSION, file_name_for};
pub use retention::{DEFAULT_SWEEP_INTERVAL, RetentionSweeper, SweepReport};
pub use ring::RingBuffer;
pub use subscriber::{
    FanoutReport, OverflowPolicy, PushOutcome, SubscriberId, SubscriberRegistry, Subscription,
};
pub use traits::EntryForwarder;
