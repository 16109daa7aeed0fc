//! The runner: gate wrappers, read-set resolution, batch application,
//! snapshot/restore.

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use quarry_store_core::{ContentStore, RefStore, Snapshot};
use quarry_stream::{
    Event, Gate, MutationBatch, ReadSet, RefTarget, ResolvedState, Stream, StreamLog, TxnContext,
};
use quarry_types::{Error, Result};

use crate::txn::TxnManager;

/// Owns store, refs and the stream; drives depth-first gate dispatch.
pub struct Runner {
    store: Box<dyn ContentStore>,
    refs: Box<dyn RefStore>,
    stream: Stream,
    txn: TxnManager,
}

impl Runner {
    /// A runner over the given drivers, without an emission log.
    pub fn new(store: Box<dyn ContentStore>, refs: Box<dyn RefStore>) -> Self {
        Self { store, refs, stream: Stream::new(), txn: TxnManager::new() }
    }

    /// A runner that records every emission for introspection.
    pub fn with_logging(store: Box<dyn ContentStore>, refs: Box<dyn RefStore>) -> Self {
        Self { store, refs, stream: Stream::with_log(), txn: TxnManager::new() }
    }

    /// Install a gate behind its resolution wrapper.
    ///
    /// A duplicate signature is fatal and surfaces as `Err`, not as an
    /// `error` event.
    pub fn register(&mut self, gate: Gate) -> Result<()> {
        self.stream.register(gate)
    }

    /// Emit an event and process it (and every event it spawns) to
    /// completion, depth-first, on the calling thread.
    pub fn emit(&mut self, event: Event) {
        let signature = event.signature();
        self.stream.record(signature);
        let Some(gate) = self.stream.gate(signature) else {
            trace!(signature, "no gate claims event; pending");
            self.stream.push_pending(event);
            return;
        };

        let outcome = self.run_gate(&gate, &event);
        let follow_ups = match outcome {
            Ok(events) => events,
            Err(err) => {
                warn!(signature, %err, "gate failed; converting to error event");
                vec![Event::Error { message: err.to_string(), source: signature.to_string() }]
            }
        };
        for event in follow_ups {
            self.emit(event);
        }
    }

    fn run_gate(&mut self, gate: &Gate, event: &Event) -> Result<Vec<Event>> {
        match gate {
            Gate::Pure(g) => g.transform(event),
            Gate::State(g) => {
                let read_set = g.reads(event)?;
                let state = self.resolve(&read_set)?;
                let batch = g.apply(event, &state)?;
                self.apply(batch)
            }
            Gate::Plain(g) => {
                let mut ctx = RunnerTxn {
                    store: &mut *self.store,
                    refs: &mut *self.refs,
                    txn: &mut self.txn,
                };
                g.handle(event, &mut ctx)
            }
        }
    }

    //─────────────────────────────
    //  Resolution
    //─────────────────────────────

    /// Resolve a read set into values: per-ref value-or-absent, per-prefix
    /// an ordered name-to-value mapping.
    pub fn resolve(&self, read_set: &ReadSet) -> Result<ResolvedState> {
        let mut state = ResolvedState::default();
        for name in &read_set.refs {
            let value = match self.refs.get(name)? {
                Some(hash) => Some(self.store.get(&hash)?),
                None => None,
            };
            state.refs.insert(name.clone(), value);
        }
        for prefix in &read_set.prefixes {
            let mut mapping = IndexMap::new();
            for name in self.refs.list(prefix)? {
                let hash = self
                    .refs
                    .get(&name)?
                    .ok_or_else(|| Error::Resolution(format!("ref '{name}' vanished during resolve")))?;
                mapping.insert(name, self.store.get(&hash)?);
            }
            state.prefixes.insert(prefix.clone(), mapping);
        }
        Ok(state)
    }

    /// Apply a mutation batch: puts in order, then ref-sets (resolving put
    /// indices), then ref-deletes. Returns the follow-up events for
    /// re-emission. Puts precede refs so a ref never points at a missing
    /// blob.
    pub fn apply(&mut self, batch: MutationBatch) -> Result<Vec<Event>> {
        let mut hashes = Vec::with_capacity(batch.puts.len());
        for put in &batch.puts {
            let hash = self.store.put(&put.value)?;
            trace!(kind = put.kind, %hash, "batch put");
            hashes.push(hash);
        }
        for ref_set in &batch.ref_sets {
            let hash = match &ref_set.target {
                RefTarget::Put(i) => hashes
                    .get(*i)
                    .cloned()
                    .ok_or_else(|| Error::Resolution(format!("refSet put index {i} out of range")))?,
                RefTarget::Hash(h) => h.clone(),
            };
            self.refs.set(&ref_set.name, &hash)?;
        }
        for name in &batch.ref_deletes {
            self.refs.delete(name)?;
        }
        Ok(batch.events)
    }

    //─────────────────────────────
    //  Snapshot / restore
    //─────────────────────────────

    /// Deep copy of store contents and refs.
    pub fn snapshot(&self) -> Result<Snapshot> {
        quarry_store_core::snapshot(&*self.store, &*self.refs)
    }

    /// Replace store and refs byte-identically.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        debug!("restoring persistence snapshot");
        quarry_store_core::restore(&mut *self.store, &mut *self.refs, snapshot)
    }

    //─────────────────────────────
    //  Pending and log
    //─────────────────────────────

    /// Drop pending events (between statements in a REPL).
    pub fn clear_pending(&mut self) {
        self.stream.clear_pending();
    }

    /// Take every pending event.
    pub fn drain_pending(&mut self) -> Vec<Event> {
        self.stream.drain_pending()
    }

    /// Pending events, in arrival order.
    pub fn pending(&self) -> &[Event] {
        self.stream.pending()
    }

    /// The emission log, when logging is on.
    pub fn log(&self) -> Option<&StreamLog> {
        self.stream.log()
    }

    /// Clear the emission log.
    pub fn clear_log(&mut self) {
        self.stream.clear_log();
    }

    /// Whether a transaction is active.
    pub fn txn_active(&self) -> bool {
        self.txn.active()
    }
}

/// The snapshot capability handed to plain gates, bound to the runner's
/// transaction stack.
struct RunnerTxn<'a> {
    store: &'a mut dyn ContentStore,
    refs: &'a mut dyn RefStore,
    txn: &'a mut TxnManager,
}

impl TxnContext for RunnerTxn<'_> {
    fn begin(&mut self) -> Result<()> {
        if self.txn.active() {
            return Err(Error::Transaction("transaction already active".into()));
        }
        let snap = quarry_store_core::snapshot(&*self.store, &*self.refs)?;
        self.txn.begin(snap)
    }

    fn commit(&mut self) -> Result<()> {
        self.txn.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        let snap = self.txn.rollback()?;
        quarry_store_core::restore(&mut *self.store, &mut *self.refs, snap)
    }

    fn snapshot(&mut self) -> Result<Snapshot> {
        quarry_store_core::snapshot(&*self.store, &*self.refs)
    }

    fn restore(&mut self, snap: Snapshot) -> Result<()> {
        quarry_store_core::restore(&mut *self.store, &mut *self.refs, snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_store_memory::{MemoryRefs, MemoryStore};
    use quarry_stream::{PlainGate, PureGate, StateGate};
    use quarry_types::Value;
    use std::sync::Arc;

    fn runner() -> Runner {
        Runner::new(Box::new(MemoryStore::new()), Box::new(MemoryRefs::new()))
    }

    struct FailingGate;
    impl PureGate for FailingGate {
        fn signature(&self) -> &'static str {
            "sql"
        }
        fn transform(&self, _: &Event) -> Result<Vec<Event>> {
            Err(Error::Runtime("boom".into()))
        }
    }

    #[test]
    fn gate_failure_becomes_an_error_event() {
        let mut r = runner();
        r.register(Gate::Pure(Arc::new(FailingGate))).unwrap();
        r.emit(Event::Sql { text: "SELECT 1".into() });
        match &r.pending()[0] {
            Event::Error { message, source } => {
                assert!(message.contains("boom"));
                assert_eq!(source, "sql");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    struct Writer;
    impl StateGate for Writer {
        fn signature(&self) -> &'static str {
            "transaction_begin" // any signature works for the test
        }
        fn reads(&self, _: &Event) -> Result<ReadSet> {
            Ok(ReadSet::new().with_ref("db/x"))
        }
        fn apply(&self, _: &Event, state: &ResolvedState) -> Result<MutationBatch> {
            assert!(state.get_ref("db/x").is_none());
            let mut batch = MutationBatch::default();
            let idx = batch.put("blob", Value::Int(7));
            batch.set_ref_to_put("db/x", idx);
            batch.emit(Event::TransactionStarted);
            Ok(batch)
        }
    }

    #[test]
    fn state_gate_round_trip_writes_and_emits() {
        let mut r = runner();
        r.register(Gate::State(Arc::new(Writer))).unwrap();
        r.emit(Event::TransactionBegin);
        assert_eq!(r.pending(), &[Event::TransactionStarted]);

        let state = r.resolve(&ReadSet::new().with_ref("db/x")).unwrap();
        assert_eq!(state.get_ref("db/x"), Some(&Value::Int(7)));
    }

    #[test]
    fn bad_put_index_is_a_resolution_error() {
        let mut r = runner();
        let mut batch = MutationBatch::default();
        batch.set_ref_to_put("db/x", 3);
        assert!(matches!(r.apply(batch), Err(Error::Resolution(_))));
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut r = runner();
        let mut batch = MutationBatch::default();
        let idx = batch.put("blob", Value::Text("before".into()));
        batch.set_ref_to_put("db/a", idx);
        r.apply(batch).unwrap();

        let snap = r.snapshot().unwrap();

        let mut batch = MutationBatch::default();
        let idx = batch.put("blob", Value::Text("after".into()));
        batch.set_ref_to_put("db/a", idx);
        batch.set_ref_to_put("db/b", idx);
        r.apply(batch).unwrap();

        r.restore(snap).unwrap();
        let state = r.resolve(&ReadSet::new().with_ref("db/a").with_ref("db/b")).unwrap();
        assert_eq!(state.get_ref("db/a"), Some(&Value::Text("before".into())));
        assert!(state.get_ref("db/b").is_none());
    }

    struct BeginGate;
    impl PlainGate for BeginGate {
        fn signature(&self) -> &'static str {
            "transaction_begin"
        }
        fn handle(&self, _: &Event, ctx: &mut dyn TxnContext) -> Result<Vec<Event>> {
            ctx.begin()?;
            Ok(vec![Event::TransactionStarted])
        }
    }

    struct RollbackGate;
    impl PlainGate for RollbackGate {
        fn signature(&self) -> &'static str {
            "transaction_rollback"
        }
        fn handle(&self, _: &Event, ctx: &mut dyn TxnContext) -> Result<Vec<Event>> {
            ctx.rollback()?;
            Ok(vec![Event::TransactionRolledBack])
        }
    }

    #[test]
    fn plain_gates_drive_begin_and_rollback() {
        let mut r = runner();
        r.register(Gate::Plain(Arc::new(BeginGate))).unwrap();
        r.register(Gate::Plain(Arc::new(RollbackGate))).unwrap();

        r.emit(Event::TransactionBegin);
        assert!(r.txn_active());

        let mut batch = MutationBatch::default();
        let idx = batch.put("blob", Value::Int(1));
        batch.set_ref_to_put("db/t", idx);
        r.apply(batch).unwrap();

        r.emit(Event::TransactionRollback);
        assert!(!r.txn_active());
        let state = r.resolve(&ReadSet::new().with_ref("db/t")).unwrap();
        assert!(state.get_ref("db/t").is_none());

        // ROLLBACK with no transaction becomes an error event.
        r.clear_pending();
        r.emit(Event::TransactionRollback);
        assert!(matches!(r.pending()[0], Event::Error { .. }));
    }
}
