//! Typed events.
//!
//! An event is the unit of dataflow: a type string plus a payload. The enum
//! keeps payloads typed while [`Event::signature`] exposes the type string
//! the stream dispatches on. Events are ephemeral; they are either consumed
//! by a gate or land in the pending list.

use serde::{Deserialize, Serialize};

use quarry_sql::plan::QueryPlan;
use quarry_sql::stmt::{
    AddColumnStmt, CreateConstraintStmt, CreateIndexStmt, CreateTableStmt, CreateTriggerStmt,
    CreateViewStmt, DeleteStmt, DropColumnStmt, DropConstraintStmt, DropIndexStmt, DropTableStmt,
    DropTriggerStmt, DropViewStmt, InsertRowStmt, InsertSelectStmt, RenameTableStmt, UpdateStmt,
};
use quarry_sql::plan::Cte;
use quarry_sql::Token;
use quarry_types::Row;

/// One event flowing through the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Raw SQL text entering the system.
    Sql {
        /// The statement text.
        text: String,
    },

    // ── parse-stage events ──
    /// Tokens routed to the create-table parser.
    CreateTableParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the drop-table parser.
    DropTableParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the insert parser.
    InsertParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the select parser, with any extracted CTEs.
    SelectParse {
        /// SELECT tokens (WITH clause stripped).
        tokens: Vec<Token>,
        /// CTE tables from a WITH clause.
        ctes: Vec<Cte>,
    },
    /// Tokens routed to the update parser.
    UpdateParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the delete parser.
    DeleteParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the create-index parser.
    IndexCreateParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the drop-index parser.
    IndexDropParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the create-view parser.
    ViewCreateParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the drop-view parser.
    ViewDropParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the create-trigger parser.
    TriggerCreateParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the drop-trigger parser.
    TriggerDropParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the add-column parser.
    AlterAddColumnParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the drop-column parser.
    AlterDropColumnParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the rename-table parser.
    RenameTableParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the add-constraint parser.
    ConstraintCreateParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// Tokens routed to the drop-constraint parser.
    ConstraintDropParse {
        /// Statement tokens.
        tokens: Vec<Token>,
    },
    /// An EXPLAIN of a query.
    Explain {
        /// The explained SELECT tokens.
        tokens: Vec<Token>,
        /// CTEs from a WITH clause.
        ctes: Vec<Cte>,
    },

    // ── executable events ──
    /// An executable query pipeline.
    QueryPlan {
        /// The plan.
        plan: QueryPlan,
    },
    /// Create a table.
    CreateTableExecute(CreateTableStmt),
    /// Drop a table.
    DropTableExecute(DropTableStmt),
    /// Insert one row.
    InsertExecute(InsertRowStmt),
    /// Insert the result of a query, optionally creating the table first.
    InsertSelect(InsertSelectStmt),
    /// Update rows.
    UpdateExecute(UpdateStmt),
    /// Delete rows (also serves TRUNCATE).
    DeleteExecute(DeleteStmt),
    /// Create an index.
    IndexCreateExecute(CreateIndexStmt),
    /// Drop an index.
    IndexDropExecute(DropIndexStmt),
    /// Create a view.
    ViewCreateExecute(CreateViewStmt),
    /// Drop a view.
    ViewDropExecute(DropViewStmt),
    /// Create a trigger.
    TriggerCreateExecute(CreateTriggerStmt),
    /// Drop a trigger.
    TriggerDropExecute(DropTriggerStmt),
    /// Add a constraint.
    ConstraintCreateExecute(CreateConstraintStmt),
    /// Drop a constraint.
    ConstraintDropExecute(DropConstraintStmt),
    /// Add a column.
    AlterAddColumnExecute(AddColumnStmt),
    /// Drop a column.
    AlterDropColumnExecute(DropColumnStmt),
    /// Rename a table.
    RenameTableExecute(RenameTableStmt),

    // ── transaction control ──
    /// BEGIN.
    TransactionBegin,
    /// COMMIT.
    TransactionCommit,
    /// ROLLBACK.
    TransactionRollback,

    // ── results ──
    /// Query result rows.
    QueryResult {
        /// Result rows.
        rows: Vec<Row>,
        /// Output column order.
        columns: Vec<String>,
    },
    /// Table created.
    TableCreated {
        /// Table name.
        table: String,
    },
    /// Table already existed (`IF NOT EXISTS`).
    TableExists {
        /// Table name.
        table: String,
    },
    /// Table dropped.
    TableDropped {
        /// Table name.
        table: String,
    },
    /// Row inserted (or upsert-resolved).
    RowInserted {
        /// Table name.
        table: String,
        /// Row id.
        id: i64,
        /// `skipped` / `updated` when an ON CONFLICT clause fired.
        conflict: Option<String>,
    },
    /// Rows updated.
    RowUpdated {
        /// Table name.
        table: String,
        /// Affected row ids.
        ids: Vec<i64>,
    },
    /// Rows deleted.
    RowDeleted {
        /// Table name.
        table: String,
        /// Affected row ids.
        ids: Vec<i64>,
    },
    /// Index created.
    IndexCreated {
        /// Index name.
        name: String,
        /// Table name.
        table: String,
    },
    /// Index dropped.
    IndexDropped {
        /// Index name.
        name: String,
        /// Table name.
        table: String,
    },
    /// View created.
    ViewCreated {
        /// View name.
        name: String,
    },
    /// View dropped.
    ViewDropped {
        /// View name.
        name: String,
    },
    /// Trigger created.
    TriggerCreated {
        /// Trigger name.
        name: String,
    },
    /// Trigger dropped.
    TriggerDropped {
        /// Trigger name.
        name: String,
    },
    /// Constraint created.
    ConstraintCreated {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// Constraint dropped.
    ConstraintDropped {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// Column added.
    ColumnAdded {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Column dropped.
    ColumnDropped {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Table renamed.
    TableRenamed {
        /// Old name.
        from: String,
        /// New name.
        to: String,
    },
    /// Transaction started.
    TransactionStarted,
    /// Transaction committed.
    TransactionCommitted,
    /// Transaction rolled back.
    TransactionRolledBack,
    /// A gate failed; errors travel as events, never as exceptions.
    Error {
        /// Human-readable message.
        message: String,
        /// Signature of the gate that failed.
        source: String,
    },
}

impl Event {
    /// The event-type string the stream dispatches on.
    pub fn signature(&self) -> &'static str {
        match self {
            Event::Sql { .. } => "sql",
            Event::CreateTableParse { .. } => "create_table_parse",
            Event::DropTableParse { .. } => "drop_table_parse",
            Event::InsertParse { .. } => "insert_parse",
            Event::SelectParse { .. } => "select_parse",
            Event::UpdateParse { .. } => "update_parse",
            Event::DeleteParse { .. } => "delete_parse",
            Event::IndexCreateParse { .. } => "index_create_parse",
            Event::IndexDropParse { .. } => "index_drop_parse",
            Event::ViewCreateParse { .. } => "view_create_parse",
            Event::ViewDropParse { .. } => "view_drop_parse",
            Event::TriggerCreateParse { .. } => "trigger_create_parse",
            Event::TriggerDropParse { .. } => "trigger_drop_parse",
            Event::AlterAddColumnParse { .. } => "alter_table_add_column_parse",
            Event::AlterDropColumnParse { .. } => "alter_table_drop_column_parse",
            Event::RenameTableParse { .. } => "rename_table_parse",
            Event::ConstraintCreateParse { .. } => "constraint_create_parse",
            Event::ConstraintDropParse { .. } => "constraint_drop_parse",
            Event::Explain { .. } => "explain",
            Event::QueryPlan { .. } => "query_plan",
            Event::CreateTableExecute(_) => "create_table_execute",
            Event::DropTableExecute(_) => "drop_table_execute",
            Event::InsertExecute(_) => "insert_execute",
            Event::InsertSelect(_) => "insert_select",
            Event::UpdateExecute(_) => "update_execute",
            Event::DeleteExecute(_) => "delete_execute",
            Event::IndexCreateExecute(_) => "index_create_execute",
            Event::IndexDropExecute(_) => "index_drop_execute",
            Event::ViewCreateExecute(_) => "view_create_execute",
            Event::ViewDropExecute(_) => "view_drop_execute",
            Event::TriggerCreateExecute(_) => "trigger_create_execute",
            Event::TriggerDropExecute(_) => "trigger_drop_execute",
            Event::ConstraintCreateExecute(_) => "constraint_create_execute",
            Event::ConstraintDropExecute(_) => "constraint_drop_execute",
            Event::AlterAddColumnExecute(_) => "alter_table_add_column_execute",
            Event::AlterDropColumnExecute(_) => "alter_table_drop_column_execute",
            Event::RenameTableExecute(_) => "rename_table_execute",
            Event::TransactionBegin => "transaction_begin",
            Event::TransactionCommit => "transaction_commit",
            Event::TransactionRollback => "transaction_rollback",
            Event::QueryResult { .. } => "query_result",
            Event::TableCreated { .. } => "table_created",
            Event::TableExists { .. } => "table_exists",
            Event::TableDropped { .. } => "table_dropped",
            Event::RowInserted { .. } => "row_inserted",
            Event::RowUpdated { .. } => "row_updated",
            Event::RowDeleted { .. } => "row_deleted",
            Event::IndexCreated { .. } => "index_created",
            Event::IndexDropped { .. } => "index_dropped",
            Event::ViewCreated { .. } => "view_created",
            Event::ViewDropped { .. } => "view_dropped",
            Event::TriggerCreated { .. } => "trigger_created",
            Event::TriggerDropped { .. } => "trigger_dropped",
            Event::ConstraintCreated { .. } => "constraint_created",
            Event::ConstraintDropped { .. } => "constraint_dropped",
            Event::ColumnAdded { .. } => "column_added",
            Event::ColumnDropped { .. } => "column_dropped",
            Event::TableRenamed { .. } => "table_renamed",
            Event::TransactionStarted => "transaction_started",
            Event::TransactionCommitted => "transaction_committed",
            Event::TransactionRolledBack => "transaction_rolled_back",
            Event::Error { .. } => "error",
        }
    }
}
