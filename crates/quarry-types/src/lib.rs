#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-types** – Shared primitive data structures for the Quarry engine.
//!
//! The crate is dependency-light and sits at the very bottom of the crate
//! graph so that *every* other crate can depend on it without causing cycles.
//! It defines the dynamic [`Value`] sum type rows are built from, the
//! deterministic canonical serialization that content addressing relies on,
//! the persisted schema blob shapes, and the engine-wide error taxonomy.

pub mod canonical;
pub mod schema;
pub mod value;

pub use canonical::{canonicalize, parse_canonical};
pub use schema::{ColumnDef, ColumnType, ConstraintDef, IndexDef, IndexEntry, TableSchema, TriggerDef, ViewDef};
pub use value::{from_value, row_to_value, to_value, value_to_row, Row, Value};

//─────────────────────────────
//  Error taxonomy
//─────────────────────────────

/// Engine-wide error taxonomy.
///
/// Errors inside SQL processing are *data*: gate wrappers convert them into
/// `error` events rather than propagating them to callers. Only the fatal
/// cases (signature collision at registration, store corruption) surface as
/// `Err` on a public API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unexpected token, unrecognized statement, truncated clause.
    #[error("parse error: {0}")]
    Parse(String),
    /// Missing table/column, duplicate object, illegal schema change.
    #[error("schema violation: {0}")]
    Schema(String),
    /// NOT NULL violation, duplicate key on a unique index.
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// Referenced blob missing, bad mutation batch, corrupted canonical form.
    #[error("resolution error: {0}")]
    Resolution(String),
    /// BEGIN while active, COMMIT/ROLLBACK while none active.
    #[error("transaction state error: {0}")]
    Transaction(String),
    /// Value outside the canonicalizable set (e.g. a non-finite float).
    #[error("unserializable value: {0}")]
    Unserializable(String),
    /// Content store lookup for a hash that was never put.
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    /// Two gates registered under the same event signature.
    #[error("signature collision: gate '{0}' is already registered")]
    SignatureCollision(String),
    /// Filesystem failure in a file-backed driver.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other gate-internal failure.
    #[error("{0}")]
    Runtime(String),
}

/// Convenience result alias used across all Quarry crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;
