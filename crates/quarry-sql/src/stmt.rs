//! Parsed statement shapes.
//!
//! Each parse gate produces one of these, which the matching execute gate
//! consumes. They carry resolved operands only; all token handling stays in
//! the parsers.

use serde::{Deserialize, Serialize};

use quarry_types::{ColumnDef, Row, Value};

use crate::plan::{Condition, Expr};
use crate::token::Token;

/// `RETURNING *` or `RETURNING col, …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Returning {
    /// Every column.
    All,
    /// Named columns.
    Columns(Vec<String>),
}

/// `CREATE TABLE` with an explicit column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableStmt {
    /// Table name.
    pub table: String,
    /// Declared columns.
    pub columns: Vec<ColumnDef>,
    /// `IF NOT EXISTS`.
    pub if_not_exists: bool,
}

/// `CREATE TABLE … AS SELECT …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableAsSelect {
    /// Table name.
    pub table: String,
    /// The SELECT tokens, unparsed.
    pub select_tokens: Vec<Token>,
}

/// Outcome of the create-table parse gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CreateTableParsed {
    /// Plain column-list form.
    Table(CreateTableStmt),
    /// AS SELECT form.
    AsSelect(CreateTableAsSelect),
}

/// `DROP TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTableStmt {
    /// Table name.
    pub table: String,
    /// `IF EXISTS`.
    pub if_exists: bool,
}

/// What `ON CONFLICT` does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConflictAction {
    /// `DO NOTHING`.
    Nothing,
    /// `DO UPDATE SET col = expr, …` (evaluated against the existing row).
    Update(Vec<(String, Expr)>),
}

/// `ON CONFLICT [(col)] DO …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnConflict {
    /// Conflict column; when absent the first unique index decides.
    pub column: Option<String>,
    /// Conflict action.
    pub action: ConflictAction,
}

/// One row insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRowStmt {
    /// Target table.
    pub table: String,
    /// Column name to literal value.
    pub row: Row,
    /// Tuple without a column list; the execute gate maps it onto the
    /// schema's column order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positional: Option<Vec<Value>>,
    /// Upsert clause.
    pub on_conflict: Option<OnConflict>,
    /// RETURNING clause.
    pub returning: Option<Returning>,
}

/// `INSERT INTO … SELECT …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertSelectStmt {
    /// Target table.
    pub table: String,
    /// Explicit column list (may be empty).
    pub columns: Vec<String>,
    /// The SELECT tokens, unparsed.
    pub select_tokens: Vec<Token>,
    /// Create the target table first, inferring columns from the first
    /// result row (`CREATE TABLE … AS SELECT`).
    pub create_table: bool,
}

/// Outcome of the insert parse gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedInsert {
    /// One event per VALUES tuple.
    Rows(Vec<InsertRowStmt>),
    /// SELECT-sourced insert.
    Select(InsertSelectStmt),
}

/// `UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStmt {
    /// Target table.
    pub table: String,
    /// Literal column changes.
    pub changes: Row,
    /// Expression-based changes, evaluated against each target's context.
    pub changes_exprs: Vec<(String, Expr)>,
    /// WHERE condition.
    pub where_cond: Option<Condition>,
    /// `FROM` table for cross-table updates.
    pub from_table: Option<String>,
    /// Alias for the FROM table.
    pub from_alias: Option<String>,
    /// RETURNING clause.
    pub returning: Option<Returning>,
}

/// `DELETE` (and `TRUNCATE`, which arrives with neither id nor WHERE).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStmt {
    /// Target table.
    pub table: String,
    /// Direct id target (`WHERE id = N`).
    pub id: Option<i64>,
    /// WHERE condition.
    pub where_cond: Option<Condition>,
    /// RETURNING clause.
    pub returning: Option<Returning>,
}

/// `CREATE [UNIQUE] INDEX`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexStmt {
    /// Index name.
    pub name: String,
    /// Table.
    pub table: String,
    /// Indexed column.
    pub column: String,
    /// Uniqueness.
    pub unique: bool,
}

/// `DROP INDEX … ON …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropIndexStmt {
    /// Index name.
    pub name: String,
    /// Table.
    pub table: String,
}

/// `CREATE VIEW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateViewStmt {
    /// View name.
    pub name: String,
    /// Declared output columns (may be empty).
    pub columns: Vec<String>,
    /// Defining query text, verbatim.
    pub query: String,
}

/// `DROP VIEW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropViewStmt {
    /// View name.
    pub name: String,
}

/// `CREATE TRIGGER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTriggerStmt {
    /// Trigger name.
    pub name: String,
    /// `BEFORE` / `AFTER`.
    pub timing: String,
    /// `INSERT` / `UPDATE` / `DELETE`.
    pub event: String,
    /// Table.
    pub table: String,
    /// Action body, verbatim.
    pub body: String,
}

/// `DROP TRIGGER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTriggerStmt {
    /// Trigger name.
    pub name: String,
}

/// `ALTER TABLE … ADD COLUMN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddColumnStmt {
    /// Table.
    pub table: String,
    /// New column.
    pub column: ColumnDef,
}

/// `ALTER TABLE … DROP COLUMN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropColumnStmt {
    /// Table.
    pub table: String,
    /// Column to remove.
    pub column: String,
}

/// `ALTER TABLE … RENAME TO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameTableStmt {
    /// Current name.
    pub table: String,
    /// New name.
    pub to: String,
}

/// `ALTER TABLE … ADD CONSTRAINT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConstraintStmt {
    /// Table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Body, verbatim.
    pub body: String,
}

/// `ALTER TABLE … DROP CONSTRAINT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropConstraintStmt {
    /// Table.
    pub table: String,
    /// Constraint name.
    pub name: String,
}
