//! Bounded hand-off between the UDP socket and the intake engine.
//!
//! The listener pushes lines with `try_send`; one worker on the blocking pool
//! drains them into [`IntakeEngine::add_entry`]. File writes and fan-out thus
//! happen off the receive path, and at most one line is ingested at a time.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use udplog_core::SharedEngine;

/// Producer side of the intake queue.
pub type IntakeSender = mpsc::Sender<String>;

/// Consumer side of the intake queue.
pub type IntakeReceiver = mpsc::Receiver<String>;

/// Creates an intake queue holding at most `capacity` lines.
#[must_use]
pub fn intake_channel(capacity: usize) -> (IntakeSender, IntakeReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Spawns the worker that feeds queued lines into `engine`.
///
/// The worker exits once every sender is dropped and the queue is empty. The
/// handle resolves to the number of entries ingested.
pub fn spawn_intake_worker(engine: SharedEngine, mut rx: IntakeReceiver) -> JoinHandle<u64> {
    tokio::task::spawn_blocking(move || {
        debug!("intake worker started");
        let mut ingested = 0u64;
        while let Some(line) = rx.blocking_recv() {
            if engine.add_entry(&line).is_some() {
                ingested += 1;
            }
        }
        info!(ingested, "intake worker drained and stopped");
        ingested
    })
}
