//! Extension points of the intake engine.

use crate::entry::LogEntry;

/// Receives every ingested entry for delivery outside the process.
///
/// The engine calls [`EntryForwarder::forward`] after the entry has been
/// buffered, fanned out and persisted, with no engine lock held. Implementors
/// must return without waiting on the network: queue the entry and deliver it
/// from their own worker. Delivery failures stay inside the forwarder.
pub trait EntryForwarder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Hands an entry to the forwarder. Must not block.
    fn forward(&self, entry: &LogEntry);
}
