#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-stream** – Event-gate dataflow layer for Quarry.
//!
//! Defines the typed [`Event`] enum with its string signatures, the three
//! [`Gate`] variants (pure / state / plain), the [`Stream`] dispatch table
//! with its pending list and emission log, and the read-declare /
//! mutate-batch vocabulary ([`ReadSet`], [`ResolvedState`],
//! [`MutationBatch`]) that quarantines all persistence I/O into the runner.

mod event;
mod gate;
mod state;
mod stream;

pub use event::Event;
pub use gate::{Gate, PlainGate, PureGate, StateGate, TxnContext};
pub use state::{MutationBatch, Put, ReadSet, RefSet, RefTarget, ResolvedState};
pub use stream::{LogEntry, Stream, StreamLog};
