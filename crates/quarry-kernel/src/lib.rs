#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-kernel** – Deterministic resolution core of Quarry.
//!
//! The [`Runner`] owns the content store, the ref namespace and the stream.
//! It is the only component that touches persistence: state gates declare
//! reads, the runner resolves them, and mutation batches come back to be
//! applied in put-before-ref order. Dispatch is depth-first on the calling
//! thread; every child event is processed to completion before the next
//! sibling, and any failure inside a gate becomes an `error` event rather
//! than an exception.

mod runner;
mod txn;

pub use runner::Runner;
pub use txn::TxnManager;
