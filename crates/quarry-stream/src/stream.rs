//! Stream: the signature-to-gate dispatch table and the pending list.
//!
//! The stream itself does not drive recursion; the runner does, because
//! state gates need persistence. The stream owns registration (duplicate
//! signatures are fatal), the pending list unclaimed events land in, and
//! the optional per-stream emission log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use quarry_types::{Error, Result};

use crate::event::Event;
use crate::gate::Gate;

/// Process-wide counter handing out stream ids for logging streams.
static STREAM_IDS: AtomicU64 = AtomicU64::new(1);

/// One recorded emission.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Emission sequence number within this stream.
    pub seq: u64,
    /// Signature of the emitted event.
    pub signature: String,
}

/// Shared emission log for introspection.
#[derive(Debug, Default)]
pub struct StreamLog {
    /// Stream id from the process-wide counter.
    pub stream_id: u64,
    entries: Vec<LogEntry>,
    next_seq: u64,
}

impl StreamLog {
    fn new() -> Self {
        Self {
            stream_id: STREAM_IDS.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    fn record(&mut self, signature: &str) {
        self.entries.push(LogEntry { seq: self.next_seq, signature: signature.to_string() });
        self.next_seq += 1;
    }

    /// Recorded emissions, oldest first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Drop recorded entries (sequence numbers keep counting).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Gate table plus pending list.
#[derive(Debug, Default)]
pub struct Stream {
    gates: HashMap<&'static str, Gate>,
    pending: Vec<Event>,
    log: Option<StreamLog>,
}

impl Stream {
    /// A stream without an emission log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream that records every emission.
    pub fn with_log() -> Self {
        Self { log: Some(StreamLog::new()), ..Self::default() }
    }

    /// Install a gate. Two gates with the same signature are a fatal
    /// registration error, raised to the caller rather than eventized.
    pub fn register(&mut self, gate: Gate) -> Result<()> {
        let signature = gate.signature();
        if self.gates.contains_key(signature) {
            return Err(Error::SignatureCollision(signature.to_string()));
        }
        debug!(signature, "gate registered");
        self.gates.insert(signature, gate);
        Ok(())
    }

    /// The gate claiming a signature, if any.
    pub fn gate(&self, signature: &str) -> Option<Gate> {
        self.gates.get(signature).cloned()
    }

    /// Record an emission in the log, if logging is on.
    pub fn record(&mut self, signature: &str) {
        if let Some(log) = &mut self.log {
            log.record(signature);
        }
    }

    /// The emission log, if logging is on.
    pub fn log(&self) -> Option<&StreamLog> {
        self.log.as_ref()
    }

    /// Clear the emission log.
    pub fn clear_log(&mut self) {
        if let Some(log) = &mut self.log {
            log.clear();
        }
    }

    /// Append an unclaimed event to the pending list.
    pub fn push_pending(&mut self, event: Event) {
        self.pending.push(event);
    }

    /// Take every pending event, leaving the list empty.
    pub fn drain_pending(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    /// Drop pending events (between statements in a REPL).
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Pending events, in arrival order.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::PureGate;
    use std::sync::Arc;

    struct Echo;
    impl PureGate for Echo {
        fn signature(&self) -> &'static str {
            "sql"
        }
        fn transform(&self, _event: &Event) -> Result<Vec<Event>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn duplicate_signature_is_fatal() {
        let mut stream = Stream::new();
        stream.register(Gate::Pure(Arc::new(Echo))).unwrap();
        let err = stream.register(Gate::Pure(Arc::new(Echo))).unwrap_err();
        assert!(matches!(err, Error::SignatureCollision(_)));
    }

    #[test]
    fn unclaimed_events_land_in_pending() {
        let mut stream = Stream::new();
        stream.push_pending(Event::TransactionStarted);
        assert_eq!(stream.pending().len(), 1);
        let drained = stream.drain_pending();
        assert_eq!(drained, vec![Event::TransactionStarted]);
        assert!(stream.pending().is_empty());
    }

    #[test]
    fn log_records_in_order_with_distinct_stream_ids() {
        let mut a = Stream::with_log();
        let mut b = Stream::with_log();
        a.record("sql");
        a.record("error");
        let log_a = a.log().unwrap();
        assert_eq!(log_a.entries().len(), 2);
        assert_eq!(log_a.entries()[0].signature, "sql");
        assert_eq!(log_a.entries()[1].seq, 1);
        assert_ne!(log_a.stream_id, b.log().unwrap().stream_id);
        b.record("sql");
    }
}
