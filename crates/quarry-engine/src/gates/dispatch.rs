//! The dispatch gate and the per-statement parse gates.
//!
//! All pure. The dispatch gate tokenizes and routes on the leading tokens;
//! each parse gate wraps one `quarry-sql` parser and produces the matching
//! execute event (or a query plan). Parse failures become `error` events
//! through the runner's wrapper.

use tracing::debug;

use quarry_sql::parse::{self, Route};
use quarry_sql::plan::{PlanStep, QueryPlan};
use quarry_sql::stmt::{CreateTableParsed, DeleteStmt, InsertSelectStmt, ParsedInsert};
use quarry_sql::tokenize;
use quarry_stream::{Event, PureGate};
use quarry_types::{Error, Result, Row, Value};

fn unexpected(gate: &str, event: &Event) -> Error {
    Error::Runtime(format!("gate '{gate}' received event '{}'", event.signature()))
}

//─────────────────────────────
//  Dispatch
//─────────────────────────────

/// Tokenize a SQL string and route it to its parse gate.
pub(crate) struct DispatchGate;

impl PureGate for DispatchGate {
    fn signature(&self) -> &'static str {
        "sql"
    }

    fn transform(&self, event: &Event) -> Result<Vec<Event>> {
        let Event::Sql { text } = event else {
            return Err(unexpected("sql", event));
        };
        let tokens = tokenize(text)?;
        let route = parse::classify(&tokens)?;
        debug!(route = ?std::mem::discriminant(&route), "sql routed");
        Ok(vec![match route {
            Route::CreateTable(tokens) => Event::CreateTableParse { tokens },
            Route::DropTable(tokens) => Event::DropTableParse { tokens },
            Route::Insert(tokens) => Event::InsertParse { tokens },
            Route::Select { tokens, ctes } => Event::SelectParse { tokens, ctes },
            Route::Update(tokens) => Event::UpdateParse { tokens },
            Route::Delete(tokens) => Event::DeleteParse { tokens },
            Route::Truncate { table } => Event::DeleteExecute(DeleteStmt {
                table,
                id: None,
                where_cond: None,
                returning: None,
            }),
            Route::IndexCreate(tokens) => Event::IndexCreateParse { tokens },
            Route::IndexDrop(tokens) => Event::IndexDropParse { tokens },
            Route::ViewCreate(tokens) => Event::ViewCreateParse { tokens },
            Route::ViewDrop(tokens) => Event::ViewDropParse { tokens },
            Route::TriggerCreate(tokens) => Event::TriggerCreateParse { tokens },
            Route::TriggerDrop(tokens) => Event::TriggerDropParse { tokens },
            Route::AlterAddColumn(tokens) => Event::AlterAddColumnParse { tokens },
            Route::AlterDropColumn(tokens) => Event::AlterDropColumnParse { tokens },
            Route::RenameTable(tokens) => Event::RenameTableParse { tokens },
            Route::ConstraintCreate(tokens) => Event::ConstraintCreateParse { tokens },
            Route::ConstraintDrop(tokens) => Event::ConstraintDropParse { tokens },
            Route::Begin => Event::TransactionBegin,
            Route::Commit => Event::TransactionCommit,
            Route::Rollback => Event::TransactionRollback,
            Route::Explain { tokens, ctes } => Event::Explain { tokens, ctes },
        }])
    }
}

//─────────────────────────────
//  Parse gates
//─────────────────────────────

macro_rules! parse_gate {
    ($name:ident, $signature:literal, $variant:ident, $parser:path, $execute:ident) => {
        pub(crate) struct $name;

        impl PureGate for $name {
            fn signature(&self) -> &'static str {
                $signature
            }

            fn transform(&self, event: &Event) -> Result<Vec<Event>> {
                let Event::$variant { tokens } = event else {
                    return Err(unexpected($signature, event));
                };
                Ok(vec![Event::$execute($parser(tokens)?)])
            }
        }
    };
}

parse_gate!(DropTableParseGate, "drop_table_parse", DropTableParse, parse::parse_drop_table, DropTableExecute);
parse_gate!(UpdateParseGate, "update_parse", UpdateParse, parse::parse_update, UpdateExecute);
parse_gate!(DeleteParseGate, "delete_parse", DeleteParse, parse::parse_delete, DeleteExecute);
parse_gate!(IndexCreateParseGate, "index_create_parse", IndexCreateParse, parse::parse_create_index, IndexCreateExecute);
parse_gate!(IndexDropParseGate, "index_drop_parse", IndexDropParse, parse::parse_drop_index, IndexDropExecute);
parse_gate!(ViewCreateParseGate, "view_create_parse", ViewCreateParse, parse::parse_create_view, ViewCreateExecute);
parse_gate!(ViewDropParseGate, "view_drop_parse", ViewDropParse, parse::parse_drop_view, ViewDropExecute);
parse_gate!(TriggerCreateParseGate, "trigger_create_parse", TriggerCreateParse, parse::parse_create_trigger, TriggerCreateExecute);
parse_gate!(TriggerDropParseGate, "trigger_drop_parse", TriggerDropParse, parse::parse_drop_trigger, TriggerDropExecute);
parse_gate!(AlterAddColumnParseGate, "alter_table_add_column_parse", AlterAddColumnParse, parse::parse_add_column, AlterAddColumnExecute);
parse_gate!(AlterDropColumnParseGate, "alter_table_drop_column_parse", AlterDropColumnParse, parse::parse_drop_column, AlterDropColumnExecute);
parse_gate!(RenameTableParseGate, "rename_table_parse", RenameTableParse, parse::parse_rename_table, RenameTableExecute);
parse_gate!(ConstraintCreateParseGate, "constraint_create_parse", ConstraintCreateParse, parse::parse_create_constraint, ConstraintCreateExecute);
parse_gate!(ConstraintDropParseGate, "constraint_drop_parse", ConstraintDropParse, parse::parse_drop_constraint, ConstraintDropExecute);

/// `CREATE TABLE`: plain form executes directly; the AS SELECT form routes
/// through the insert-select plan with table creation on.
pub(crate) struct CreateTableParseGate;

impl PureGate for CreateTableParseGate {
    fn signature(&self) -> &'static str {
        "create_table_parse"
    }

    fn transform(&self, event: &Event) -> Result<Vec<Event>> {
        let Event::CreateTableParse { tokens } = event else {
            return Err(unexpected("create_table_parse", event));
        };
        Ok(vec![match parse::parse_create_table(tokens)? {
            CreateTableParsed::Table(stmt) => Event::CreateTableExecute(stmt),
            CreateTableParsed::AsSelect(stmt) => Event::InsertSelect(InsertSelectStmt {
                table: stmt.table,
                columns: Vec::new(),
                select_tokens: stmt.select_tokens,
                create_table: true,
            }),
        }])
    }
}

/// `INSERT`: one execute event per VALUES tuple; SELECT sources become an
/// insert-select plan.
pub(crate) struct InsertParseGate;

impl PureGate for InsertParseGate {
    fn signature(&self) -> &'static str {
        "insert_parse"
    }

    fn transform(&self, event: &Event) -> Result<Vec<Event>> {
        let Event::InsertParse { tokens } = event else {
            return Err(unexpected("insert_parse", event));
        };
        Ok(match parse::parse_insert(tokens)? {
            ParsedInsert::Rows(rows) => rows.into_iter().map(Event::InsertExecute).collect(),
            ParsedInsert::Select(stmt) => vec![Event::InsertSelect(stmt)],
        })
    }
}

/// `SELECT`: tokens to an executable query plan.
pub(crate) struct SelectParseGate;

impl PureGate for SelectParseGate {
    fn signature(&self) -> &'static str {
        "select_parse"
    }

    fn transform(&self, event: &Event) -> Result<Vec<Event>> {
        let Event::SelectParse { tokens, ctes } = event else {
            return Err(unexpected("select_parse", event));
        };
        let plan = parse::parse_select(tokens, ctes.clone())?;
        Ok(vec![Event::QueryPlan { plan }])
    }
}

//─────────────────────────────
//  EXPLAIN
//─────────────────────────────

/// Render a query plan as rows, one per pipeline step.
pub(crate) struct ExplainGate;

impl PureGate for ExplainGate {
    fn signature(&self) -> &'static str {
        "explain"
    }

    fn transform(&self, event: &Event) -> Result<Vec<Event>> {
        let Event::Explain { tokens, ctes } = event else {
            return Err(unexpected("explain", event));
        };
        let plan = parse::parse_select(tokens, ctes.clone())?;
        let rows = explain_rows(&plan);
        Ok(vec![Event::QueryResult {
            rows,
            columns: vec!["step".into(), "kind".into(), "detail".into()],
        }])
    }
}

fn explain_rows(plan: &QueryPlan) -> Vec<Row> {
    plan.pipeline
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let (kind, detail) = describe(step);
            Row::from([
                ("step".to_string(), Value::Int(i as i64 + 1)),
                ("kind".to_string(), Value::Text(kind.to_string())),
                ("detail".to_string(), Value::Text(detail)),
            ])
        })
        .collect()
}

fn describe(step: &PlanStep) -> (&'static str, String) {
    match step {
        PlanStep::VirtualRow => ("virtual_row", String::new()),
        PlanStep::TableScan { table, alias } => (
            "table_scan",
            match alias {
                Some(a) => format!("{table} AS {a}"),
                None => table.clone(),
            },
        ),
        PlanStep::DerivedScan { alias, .. } => ("derived_scan", alias.clone()),
        PlanStep::IndexScan { table, index, .. } => ("index_scan", format!("{table}.{index}")),
        PlanStep::Filter { .. } => ("filter", "condition".to_string()),
        PlanStep::Project { columns } => ("project", format!("{} columns", columns.len())),
        PlanStep::OrderBy { keys } => (
            "order_by",
            keys.iter()
                .map(|k| {
                    format!("{}{}", k.column, if k.desc { " DESC" } else { "" })
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        PlanStep::Limit { limit, offset } => (
            "limit",
            format!("limit {} offset {offset}", limit.map_or("all".to_string(), |l| l.to_string())),
        ),
        PlanStep::Distinct { .. } => ("distinct", String::new()),
        PlanStep::Aggregate { group_by, aggs } => (
            "aggregate",
            format!("group by [{}], {} aggregates", group_by.join(", "), aggs.len()),
        ),
        PlanStep::Window { funcs } => (
            "window",
            funcs.iter().map(|f| f.alias.clone()).collect::<Vec<_>>().join(", "),
        ),
        PlanStep::Join { kind, table, .. } => ("join", format!("{kind:?} {table}").to_lowercase()),
        PlanStep::SetOp { op, all, .. } => (
            "union",
            format!("{op:?}{}", if *all { " all" } else { "" }).to_lowercase(),
        ),
    }
}
