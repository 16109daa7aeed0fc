//! Index execute gates.

use quarry_stream::{Event, MutationBatch, ReadSet, ResolvedState, StateGate};
use quarry_types::{to_value, Error, IndexDef, Result};

use crate::paths;

use super::{build_index_entries, rows_from_state, schema_from_state};

pub(crate) struct IndexCreateGate;

impl StateGate for IndexCreateGate {
    fn signature(&self) -> &'static str {
        "index_create_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::IndexCreateExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.table))
            .with_ref(paths::index_ref(&stmt.table, &stmt.name))
            .with_prefix(paths::rows_prefix(&stmt.table)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::IndexCreateExecute(stmt) = event else {
            return Err(Error::Runtime("index_create_execute received a foreign event".into()));
        };
        let schema = schema_from_state(state, &stmt.table)?;
        if stmt.column != "id" && schema.column(&stmt.column).is_none() {
            return Err(Error::Schema(format!(
                "no such column '{}' in '{}'",
                stmt.column, stmt.table
            )));
        }
        let ref_name = paths::index_ref(&stmt.table, &stmt.name);
        if state.get_ref(&ref_name).is_some() {
            return Err(Error::Schema(format!(
                "index '{}' already exists on '{}'",
                stmt.name, stmt.table
            )));
        }

        let rows = rows_from_state(state, &stmt.table)?;
        let entries = build_index_entries(&stmt.column, &rows);
        if stmt.unique {
            if let Some(dup) = entries.iter().find(|e| e.row_ids.len() > 1) {
                return Err(Error::Integrity(format!(
                    "duplicate key {} for unique index '{}'",
                    dup.key.display_string(),
                    stmt.name
                )));
            }
        }

        let def = IndexDef { column: stmt.column.clone(), unique: stmt.unique, entries };
        let mut batch = MutationBatch::default();
        let put = batch.put("index", to_value(&def)?);
        batch.set_ref_to_put(ref_name, put);
        batch.emit(Event::IndexCreated { name: stmt.name.clone(), table: stmt.table.clone() });
        Ok(batch)
    }
}

pub(crate) struct IndexDropGate;

impl StateGate for IndexDropGate {
    fn signature(&self) -> &'static str {
        "index_drop_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::IndexDropExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::index_ref(&stmt.table, &stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::IndexDropExecute(stmt) = event else {
            return Err(Error::Runtime("index_drop_execute received a foreign event".into()));
        };
        let ref_name = paths::index_ref(&stmt.table, &stmt.name);
        if state.get_ref(&ref_name).is_none() {
            return Err(Error::Schema(format!(
                "no such index '{}' on '{}'",
                stmt.name, stmt.table
            )));
        }
        let mut batch = MutationBatch::default();
        batch.delete_ref(ref_name);
        batch.emit(Event::IndexDropped { name: stmt.name.clone(), table: stmt.table.clone() });
        Ok(batch)
    }
}
