//! Database facade: the submit-SQL / get-schema surface.
//!
//! Wraps a configured runner with every gate registered. One statement in,
//! one response out: rows for queries (SELECT, RETURNING, EXPLAIN), a
//! canonical acknowledgement for mutations, or the collected error text.
//! A small diagnostics payload (elapsed time, events dispatched) rides
//! along.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use quarry_kernel::Runner;
use quarry_store_fs::{FileRefs, FileStore};
use quarry_store_memory::{MemoryRefs, MemoryStore};
use quarry_stream::{Event, ReadSet};
use quarry_types::{from_value, ColumnDef, Result, Row, TableSchema};

use crate::gates;

//─────────────────────────────
//  Configuration
//─────────────────────────────

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageConfig {
    /// In-memory persistence (non-durable).
    Memory,
    /// File-backed persistence rooted at a directory.
    Files {
        /// Root directory holding `store/` and `refs/`.
        root: PathBuf,
    },
}

/// Configuration for a [`Database`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Storage backend.
    pub storage: StorageConfig,
    /// Record every emission for the diagnostics payload.
    pub logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { storage: StorageConfig::Memory, logging: true }
    }
}

//─────────────────────────────
//  Response surface
//─────────────────────────────

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Query result rows.
    Rows(Vec<Row>),
    /// Canonical acknowledgement text.
    Message(String),
    /// Collected error text (multiple errors joined with `"; "`).
    Error(String),
}

/// Diagnostics riding along with a response.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Wall-clock processing time.
    pub elapsed: Duration,
    /// Number of events dispatched for the statement.
    pub events: usize,
}

/// Response to one submitted statement.
#[derive(Debug, Clone)]
pub struct SqlResponse {
    /// Rows, message or error.
    pub outcome: Outcome,
    /// Processing diagnostics.
    pub diagnostics: Diagnostics,
}

impl SqlResponse {
    /// Result rows, when the statement produced any.
    pub fn rows(&self) -> Option<&[Row]> {
        match &self.outcome {
            Outcome::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Acknowledgement message, when the statement produced one.
    pub fn message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Error text, when any error event surfaced.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// One table of the schema listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub table: String,
    /// Declared columns.
    pub columns: Vec<ColumnDef>,
}

//─────────────────────────────
//  Database
//─────────────────────────────

/// A complete engine instance: storage drivers, runner, registered gates.
pub struct Database {
    runner: Runner,
}

impl Database {
    /// An in-memory database with default configuration.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_config(DatabaseConfig::default())
    }

    /// A file-backed database rooted at a directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_config(DatabaseConfig {
            storage: StorageConfig::Files { root: root.as_ref().to_path_buf() },
            ..DatabaseConfig::default()
        })
    }

    /// Build a database from explicit configuration.
    pub fn with_config(config: DatabaseConfig) -> Result<Self> {
        let mut runner = match &config.storage {
            StorageConfig::Memory => {
                let store = Box::new(MemoryStore::new());
                let refs = Box::new(MemoryRefs::new());
                if config.logging {
                    Runner::with_logging(store, refs)
                } else {
                    Runner::new(store, refs)
                }
            }
            StorageConfig::Files { root } => {
                let store = Box::new(FileStore::open(root)?);
                let refs = Box::new(FileRefs::open(root)?);
                if config.logging {
                    Runner::with_logging(store, refs)
                } else {
                    Runner::new(store, refs)
                }
            }
        };
        gates::register_all(&mut runner)?;
        info!("database ready");
        Ok(Self { runner })
    }

    /// Submit one SQL statement and compose its response.
    pub fn execute(&mut self, sql: &str) -> SqlResponse {
        let start = Instant::now();
        self.runner.clear_pending();
        self.runner.clear_log();
        self.runner.emit(Event::Sql { text: sql.to_string() });
        let pending = self.runner.drain_pending();
        let events = self
            .runner
            .log()
            .map(|l| l.entries().len())
            .unwrap_or(pending.len());
        SqlResponse {
            outcome: compose(pending),
            diagnostics: Diagnostics { elapsed: start.elapsed(), events },
        }
    }

    /// Ordered schema listing, tables sorted by name.
    pub fn schema(&self) -> Result<Vec<TableInfo>> {
        let state = self.runner.resolve(&ReadSet::new().with_prefix("db/tables/"))?;
        let mut out = Vec::new();
        for (name, value) in state.prefix("db/tables/")? {
            if name.ends_with("/schema") {
                let schema: TableSchema = from_value(value)?;
                out.push(TableInfo { table: schema.name, columns: schema.columns });
            }
        }
        // Ref listing is sorted, so tables already arrive in name order.
        Ok(out)
    }

    /// Event signatures the last statement dispatched (diagnostic surface).
    pub fn last_events(&self) -> Vec<String> {
        self.runner
            .log()
            .map(|l| l.entries().iter().map(|e| e.signature.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether a transaction is active.
    pub fn in_transaction(&self) -> bool {
        self.runner.txn_active()
    }
}

//─────────────────────────────
//  Response composition
//─────────────────────────────

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn compose(pending: Vec<Event>) -> Outcome {
    let mut errors: Vec<String> = Vec::new();
    let mut rows: Vec<Row> = Vec::new();
    let mut saw_result = false;
    let mut messages: Vec<String> = Vec::new();
    let mut inserted = 0usize;
    let mut last_id = 0i64;
    let mut updated: Option<usize> = None;
    let mut deleted: Option<usize> = None;

    for event in pending {
        match event {
            Event::Error { message, .. } => errors.push(message),
            Event::QueryResult { rows: mut r, .. } => {
                saw_result = true;
                rows.append(&mut r);
            }
            Event::RowInserted { id, .. } => {
                inserted += 1;
                last_id = id;
            }
            Event::RowUpdated { ids, .. } => {
                *updated.get_or_insert(0) += ids.len();
            }
            Event::RowDeleted { ids, .. } => {
                *deleted.get_or_insert(0) += ids.len();
            }
            Event::TableCreated { table } => messages.push(format!("Table '{table}' created.")),
            Event::TableExists { table } => {
                messages.push(format!("Table '{table}' already exists."))
            }
            Event::TableDropped { table } => messages.push(format!("Table '{table}' dropped.")),
            Event::IndexCreated { name, .. } => messages.push(format!("Index '{name}' created.")),
            Event::IndexDropped { name, .. } => messages.push(format!("Index '{name}' dropped.")),
            Event::ViewCreated { name } => messages.push(format!("View '{name}' created.")),
            Event::ViewDropped { name } => messages.push(format!("View '{name}' dropped.")),
            Event::TriggerCreated { .. } => messages.push("Trigger created.".into()),
            Event::TriggerDropped { .. } => messages.push("Trigger dropped.".into()),
            Event::ConstraintCreated { name, .. } => {
                messages.push(format!("Constraint '{name}' created."))
            }
            Event::ConstraintDropped { name, .. } => {
                messages.push(format!("Constraint '{name}' dropped."))
            }
            Event::ColumnAdded { table, column } => {
                messages.push(format!("Column '{column}' added to '{table}'."))
            }
            Event::ColumnDropped { table, column } => {
                messages.push(format!("Column '{column}' dropped from '{table}'."))
            }
            Event::TableRenamed { from, to } => {
                messages.push(format!("Table '{from}' renamed to '{to}'."))
            }
            Event::TransactionStarted => messages.push("Transaction started.".into()),
            Event::TransactionCommitted => messages.push("Transaction committed.".into()),
            Event::TransactionRolledBack => messages.push("Transaction rolled back.".into()),
            _ => {}
        }
    }

    if !errors.is_empty() {
        return Outcome::Error(errors.join("; "));
    }
    if saw_result {
        return Outcome::Rows(rows);
    }
    if inserted > 0 {
        messages.push(format!(
            "{inserted} row{} inserted (last id: {last_id}).",
            plural(inserted)
        ));
    }
    if let Some(updated) = updated {
        messages.push(format!("{updated} row{} updated.", plural(updated)));
    }
    if let Some(deleted) = deleted {
        messages.push(format!("{deleted} row{} deleted.", plural(deleted)));
    }
    if messages.is_empty() {
        return Outcome::Message("OK.".into());
    }
    Outcome::Message(messages.join(" "))
}
