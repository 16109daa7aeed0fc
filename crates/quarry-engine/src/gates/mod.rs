//! Gate implementations.
//!
//! Parse gates are thin pure wrappers over the `quarry-sql` parsers;
//! execute gates follow the read-declare / mutate-batch discipline; the
//! transaction gates are the only plain gates. [`register_all`] installs
//! the full set on a runner.

mod ddl;
mod dispatch;
mod dml;
mod index;
mod query;
mod txn;
mod view;

use std::sync::Arc;

use quarry_kernel::Runner;
use quarry_stream::{Gate, ResolvedState};
use quarry_types::{
    from_value, value_to_row, Error, IndexDef, IndexEntry, Result, Row, TableSchema, Value,
};

use quarry_sql::stmt::Returning;

use crate::eval::{lookup, values_equal};
use crate::paths;

/// Register every gate with the runner. A collision here is a programming
/// error and surfaces as `Err`.
pub fn register_all(runner: &mut Runner) -> Result<()> {
    // Dispatch and parse gates
    runner.register(Gate::Pure(Arc::new(dispatch::DispatchGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::CreateTableParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::DropTableParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::InsertParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::SelectParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::UpdateParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::DeleteParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::IndexCreateParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::IndexDropParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::ViewCreateParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::ViewDropParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::TriggerCreateParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::TriggerDropParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::AlterAddColumnParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::AlterDropColumnParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::RenameTableParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::ConstraintCreateParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::ConstraintDropParseGate)))?;
    runner.register(Gate::Pure(Arc::new(dispatch::ExplainGate)))?;

    // Query execution
    runner.register(Gate::State(Arc::new(query::QueryPlanGate)))?;

    // DDL execution
    runner.register(Gate::State(Arc::new(ddl::CreateTableGate)))?;
    runner.register(Gate::State(Arc::new(ddl::DropTableGate)))?;
    runner.register(Gate::State(Arc::new(ddl::AddColumnGate)))?;
    runner.register(Gate::State(Arc::new(ddl::DropColumnGate)))?;
    runner.register(Gate::State(Arc::new(ddl::RenameTableGate)))?;
    runner.register(Gate::State(Arc::new(ddl::ConstraintCreateGate)))?;
    runner.register(Gate::State(Arc::new(ddl::ConstraintDropGate)))?;

    // Index / view / trigger execution
    runner.register(Gate::State(Arc::new(index::IndexCreateGate)))?;
    runner.register(Gate::State(Arc::new(index::IndexDropGate)))?;
    runner.register(Gate::State(Arc::new(view::ViewCreateGate)))?;
    runner.register(Gate::State(Arc::new(view::ViewDropGate)))?;
    runner.register(Gate::State(Arc::new(view::TriggerCreateGate)))?;
    runner.register(Gate::State(Arc::new(view::TriggerDropGate)))?;

    // DML execution
    runner.register(Gate::State(Arc::new(dml::InsertGate)))?;
    runner.register(Gate::State(Arc::new(dml::InsertSelectGate)))?;
    runner.register(Gate::State(Arc::new(dml::UpdateGate)))?;
    runner.register(Gate::State(Arc::new(dml::DeleteGate)))?;

    // Transaction control
    runner.register(Gate::Plain(Arc::new(txn::BeginGate)))?;
    runner.register(Gate::Plain(Arc::new(txn::CommitGate)))?;
    runner.register(Gate::Plain(Arc::new(txn::RollbackGate)))?;

    Ok(())
}

//─────────────────────────────
//  Shared state readers
//─────────────────────────────

/// Parse the table schema out of resolved state.
pub(crate) fn schema_from_state(state: &ResolvedState, table: &str) -> Result<TableSchema> {
    let value = state
        .get_ref(&paths::schema_ref(table))
        .ok_or_else(|| Error::Schema(format!("no such table '{table}'")))?;
    from_value(value)
}

/// Rows of a table from resolved state, id-ordered.
pub(crate) fn rows_from_state(state: &ResolvedState, table: &str) -> Result<Vec<(i64, Row)>> {
    let mapping = state.prefix(&paths::rows_prefix(table))?;
    let mut rows = Vec::with_capacity(mapping.len());
    for (name, value) in mapping {
        let row = value_to_row(value)?;
        let id = row
            .get("id")
            .and_then(Value::as_int)
            .or_else(|| paths::id_from_row_ref(name))
            .ok_or_else(|| Error::Resolution(format!("row '{name}' has no id")))?;
        rows.push((id, row));
    }
    rows.sort_by_key(|(id, _)| *id);
    Ok(rows)
}

/// Indexes of a table from resolved state, name-ordered.
pub(crate) fn indexes_from_state(state: &ResolvedState, table: &str) -> Result<Vec<(String, IndexDef)>> {
    let mapping = state.prefix(&paths::indexes_prefix(table))?;
    let mut out = Vec::with_capacity(mapping.len());
    for (name, value) in mapping {
        let short = paths::name_from_index_ref(name).unwrap_or(name).to_string();
        out.push((short, from_value(value)?));
    }
    Ok(out)
}

/// The id counter of a table (stored as a string integer blob).
pub(crate) fn next_id_from_state(state: &ResolvedState, table: &str) -> Result<i64> {
    match state.get_ref(&paths::next_id_ref(table)) {
        Some(Value::Text(s)) => s
            .parse()
            .map_err(|_| Error::Resolution(format!("bad next_id counter '{s}'"))),
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(Error::Resolution(format!(
            "bad next_id counter of type {}",
            other.type_name()
        ))),
        None => Err(Error::Schema(format!("no such table '{table}'"))),
    }
}

//─────────────────────────────
//  Index maintenance
//─────────────────────────────

/// Build a flat entry list for a column over a row set. Null values are
/// not indexed; entries sort by key, row ids ascending within an entry.
pub(crate) fn build_index_entries(column: &str, rows: &[(i64, Row)]) -> Vec<IndexEntry> {
    let mut entries: Vec<IndexEntry> = Vec::new();
    for (id, row) in rows {
        let key = lookup(row, column);
        if key.is_null() {
            continue;
        }
        match entries.iter_mut().find(|e| values_equal(&e.key, &key)) {
            Some(entry) => entry.row_ids.push(*id),
            None => entries.push(IndexEntry { key, row_ids: vec![*id] }),
        }
    }
    entries.sort_by(|a, b| a.key.total_cmp(&b.key));
    for entry in &mut entries {
        entry.row_ids.sort_unstable();
    }
    entries
}

/// Rebuild every index of a table against a post-mutation row set,
/// appending the puts and ref-sets to a batch.
pub(crate) fn rebuild_indexes(
    batch: &mut quarry_stream::MutationBatch,
    table: &str,
    indexes: &[(String, IndexDef)],
    rows: &[(i64, Row)],
) -> Result<()> {
    for (name, def) in indexes {
        let rebuilt = IndexDef {
            column: def.column.clone(),
            unique: def.unique,
            entries: build_index_entries(&def.column, rows),
        };
        let idx = batch.put("index", quarry_types::to_value(&rebuilt)?);
        batch.set_ref_to_put(paths::index_ref(table, name), idx);
    }
    Ok(())
}

//─────────────────────────────
//  RETURNING projection
//─────────────────────────────

/// Project rows for a RETURNING clause.
pub(crate) fn returning_output(rows: &[Row], returning: &Returning) -> (Vec<Row>, Vec<String>) {
    match returning {
        Returning::All => {
            let columns = rows
                .first()
                .map(|r| r.keys().filter(|k| !k.contains('.')).cloned().collect())
                .unwrap_or_default();
            (rows.to_vec(), columns)
        }
        Returning::Columns(cols) => {
            let columns: Vec<String> = cols
                .iter()
                .map(|c| c.rsplit('.').next().unwrap_or(c).to_string())
                .collect();
            let projected = rows
                .iter()
                .map(|row| {
                    cols.iter()
                        .zip(&columns)
                        .map(|(src, out)| (out.clone(), lookup(row, src)))
                        .collect()
                })
                .collect();
            (projected, columns)
        }
    }
}

/// Fill a supplied row out to the full schema: defaults applied, NOT NULL
/// enforced, unknown columns rejected.
pub(crate) fn complete_row(schema: &TableSchema, supplied: &Row, id: i64) -> Result<Row> {
    for key in supplied.keys() {
        if schema.column(key).is_none() {
            return Err(Error::Schema(format!(
                "no such column '{}' in '{}'",
                key, schema.name
            )));
        }
    }
    let mut row = Row::new();
    row.insert("id".to_string(), Value::Int(id));
    for col in &schema.columns {
        let value = match supplied.get(&col.name) {
            Some(v) if !v.is_null() => v.clone(),
            _ => match &col.default {
                Some(d) => d.clone(),
                None => Value::Null,
            },
        };
        if value.is_null() && !col.nullable {
            return Err(Error::Integrity(format!(
                "NOT NULL violation: column '{}' of '{}'",
                col.name, schema.name
            )));
        }
        row.insert(col.name.clone(), value);
    }
    Ok(row)
}
