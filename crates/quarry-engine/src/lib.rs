#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-engine** – The Quarry SQL engine.
//!
//! Sits on the kernel and wires the whole system together: the expression
//! evaluator, the pipeline executor with its row operators, every parse and
//! execute gate, and the [`Database`] facade exposing the submit-SQL /
//! get-schema surface.
//!
//! Data flow for one statement: an `sql` event enters the runner, the
//! dispatch gate tokenizes and routes it, a statement parse gate produces a
//! `query_plan` or `*_execute` event, and the matching execute gate reads
//! declared state and returns a mutation batch whose follow-up events
//! become the response.

pub mod db;
pub mod eval;
pub mod exec;
pub mod gates;
pub mod paths;

pub use db::{Database, DatabaseConfig, Diagnostics, Outcome, SqlResponse, StorageConfig, TableInfo};
pub use exec::{plan_read_set, run_plan, ExecOutput};
pub use gates::register_all;
