//! Gate variants.
//!
//! A gate claims exactly one event signature. The three variants differ
//! only in what their resolution path needs: pure gates transform events,
//! state gates declare reads and produce mutation batches, plain gates get
//! out-of-band access to the runner's snapshot capability (transaction
//! control only).

use std::sync::Arc;

use quarry_store_core::Snapshot;
use quarry_types::Result;

use crate::event::Event;
use crate::state::{MutationBatch, ReadSet, ResolvedState};

/// A gate with no state access and no side effects: event in, events out.
pub trait PureGate: Send + Sync {
    /// The event signature this gate claims.
    fn signature(&self) -> &'static str;

    /// Transform an event into zero, one or many events.
    fn transform(&self, event: &Event) -> Result<Vec<Event>>;
}

/// A gate that reads declared state and mutates through a batch.
pub trait StateGate: Send + Sync {
    /// The event signature this gate claims.
    fn signature(&self) -> &'static str;

    /// Declare what this gate will read for the event.
    fn reads(&self, event: &Event) -> Result<ReadSet>;

    /// Produce the mutation batch from the event and the resolved state.
    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch>;
}

/// Out-of-band access handed to plain gates: the runner's snapshot
/// capability bound to its transaction stack.
pub trait TxnContext {
    /// Capture a snapshot and push it (BEGIN). Fails while active.
    fn begin(&mut self) -> Result<()>;

    /// Pop and discard (COMMIT). Fails while none active.
    fn commit(&mut self) -> Result<()>;

    /// Pop and restore byte-identically (ROLLBACK). Fails while none active.
    fn rollback(&mut self) -> Result<()>;

    /// Capture the current persistence state.
    fn snapshot(&mut self) -> Result<Snapshot>;

    /// Replace the persistence state.
    fn restore(&mut self, snap: Snapshot) -> Result<()>;
}

/// A gate with direct runner access; used only for transaction control.
pub trait PlainGate: Send + Sync {
    /// The event signature this gate claims.
    fn signature(&self) -> &'static str;

    /// Handle the event with snapshot access, emitting follow-up events.
    fn handle(&self, event: &Event, ctx: &mut dyn TxnContext) -> Result<Vec<Event>>;
}

/// Tagged gate variant; the runner dispatches on it.
#[derive(Clone)]
pub enum Gate {
    /// Stateless transform.
    Pure(Arc<dyn PureGate>),
    /// Read-declare / mutate-batch.
    State(Arc<dyn StateGate>),
    /// Transaction control.
    Plain(Arc<dyn PlainGate>),
}

impl Gate {
    /// The event signature this gate claims.
    pub fn signature(&self) -> &'static str {
        match self {
            Gate::Pure(g) => g.signature(),
            Gate::State(g) => g.signature(),
            Gate::Plain(g) => g.signature(),
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Gate::Pure(_) => "pure",
            Gate::State(_) => "state",
            Gate::Plain(_) => "plain",
        };
        write!(f, "Gate::{}({})", kind, self.signature())
    }
}
