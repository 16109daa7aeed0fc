//! DDL execute gates: tables, columns, renames, constraints.

use quarry_stream::{Event, MutationBatch, ReadSet, ResolvedState, StateGate};
use quarry_types::{to_value, ConstraintDef, Error, Result, TableSchema, Value};

use crate::paths;

use super::schema_from_state;

fn foreign(gate: &str, event: &Event) -> Error {
    Error::Runtime(format!("gate '{gate}' received event '{}'", event.signature()))
}

//─────────────────────────────
//  CREATE TABLE
//─────────────────────────────

pub(crate) struct CreateTableGate;

impl StateGate for CreateTableGate {
    fn signature(&self) -> &'static str {
        "create_table_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::CreateTableExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::schema_ref(&stmt.table)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::CreateTableExecute(stmt) = event else {
            return Err(foreign("create_table_execute", event));
        };
        if state.get_ref(&paths::schema_ref(&stmt.table)).is_some() {
            if stmt.if_not_exists {
                return Ok(MutationBatch::events(vec![Event::TableExists {
                    table: stmt.table.clone(),
                }]));
            }
            return Err(Error::Schema(format!("table '{}' already exists", stmt.table)));
        }

        let schema = TableSchema { name: stmt.table.clone(), columns: stmt.columns.clone() };
        let mut batch = MutationBatch::default();
        let schema_put = batch.put("schema", to_value(&schema)?);
        batch.set_ref_to_put(paths::schema_ref(&stmt.table), schema_put);
        let counter_put = batch.put("next_id", Value::Text("0".into()));
        batch.set_ref_to_put(paths::next_id_ref(&stmt.table), counter_put);
        batch.emit(Event::TableCreated { table: stmt.table.clone() });
        Ok(batch)
    }
}

//─────────────────────────────
//  DROP TABLE
//─────────────────────────────

pub(crate) struct DropTableGate;

impl StateGate for DropTableGate {
    fn signature(&self) -> &'static str {
        "drop_table_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::DropTableExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.table))
            .with_prefix(paths::table_prefix(&stmt.table))
            .with_prefix(paths::constraints_prefix(&stmt.table)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::DropTableExecute(stmt) = event else {
            return Err(foreign("drop_table_execute", event));
        };
        if state.get_ref(&paths::schema_ref(&stmt.table)).is_none() {
            if stmt.if_exists {
                return Ok(MutationBatch::default());
            }
            return Err(Error::Schema(format!("no such table '{}'", stmt.table)));
        }

        let mut batch = MutationBatch::default();
        for name in state.prefix(&paths::table_prefix(&stmt.table))?.keys() {
            batch.delete_ref(name.clone());
        }
        for name in state.prefix(&paths::constraints_prefix(&stmt.table))?.keys() {
            batch.delete_ref(name.clone());
        }
        batch.emit(Event::TableDropped { table: stmt.table.clone() });
        Ok(batch)
    }
}

//─────────────────────────────
//  ALTER TABLE … ADD COLUMN
//─────────────────────────────

pub(crate) struct AddColumnGate;

impl StateGate for AddColumnGate {
    fn signature(&self) -> &'static str {
        "alter_table_add_column_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::AlterAddColumnExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.table))
            .with_prefix(paths::rows_prefix(&stmt.table)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::AlterAddColumnExecute(stmt) = event else {
            return Err(foreign("alter_table_add_column_execute", event));
        };
        let mut schema = schema_from_state(state, &stmt.table)?;
        if stmt.column.name == "id" || schema.column(&stmt.column.name).is_some() {
            return Err(Error::Schema(format!(
                "column '{}' already exists in '{}'",
                stmt.column.name, stmt.table
            )));
        }
        schema.columns.push(stmt.column.clone());

        let mut batch = MutationBatch::default();
        let schema_put = batch.put("schema", to_value(&schema)?);
        batch.set_ref_to_put(paths::schema_ref(&stmt.table), schema_put);

        // Backfill existing rows so `*` sees the column.
        let fill = stmt.column.default.clone().unwrap_or(Value::Null);
        for (name, value) in state.prefix(&paths::rows_prefix(&stmt.table))? {
            let mut row = quarry_types::value_to_row(value)?;
            row.insert(stmt.column.name.clone(), fill.clone());
            let put = batch.put("row", quarry_types::row_to_value(&row));
            batch.set_ref_to_put(name.clone(), put);
        }

        batch.emit(Event::ColumnAdded { table: stmt.table.clone(), column: stmt.column.name.clone() });
        Ok(batch)
    }
}

//─────────────────────────────
//  ALTER TABLE … DROP COLUMN
//─────────────────────────────

pub(crate) struct DropColumnGate;

impl StateGate for DropColumnGate {
    fn signature(&self) -> &'static str {
        "alter_table_drop_column_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::AlterDropColumnExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.table))
            .with_prefix(paths::rows_prefix(&stmt.table))
            .with_prefix(paths::indexes_prefix(&stmt.table)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::AlterDropColumnExecute(stmt) = event else {
            return Err(foreign("alter_table_drop_column_execute", event));
        };
        if stmt.column == "id" {
            return Err(Error::Schema("the id column cannot be dropped".into()));
        }
        let mut schema = schema_from_state(state, &stmt.table)?;
        if schema.column(&stmt.column).is_none() {
            return Err(Error::Schema(format!(
                "no such column '{}' in '{}'",
                stmt.column, stmt.table
            )));
        }
        schema.columns.retain(|c| c.name != stmt.column);

        let mut batch = MutationBatch::default();
        let schema_put = batch.put("schema", to_value(&schema)?);
        batch.set_ref_to_put(paths::schema_ref(&stmt.table), schema_put);

        for (name, value) in state.prefix(&paths::rows_prefix(&stmt.table))? {
            let mut row = quarry_types::value_to_row(value)?;
            if row.remove(&stmt.column).is_some() {
                let put = batch.put("row", quarry_types::row_to_value(&row));
                batch.set_ref_to_put(name.clone(), put);
            }
        }

        // Indexes over the dropped column go with it.
        for (name, value) in state.prefix(&paths::indexes_prefix(&stmt.table))? {
            if let Ok(def) = quarry_types::from_value::<quarry_types::IndexDef>(value) {
                if def.column == stmt.column {
                    batch.delete_ref(name.clone());
                }
            }
        }

        batch.emit(Event::ColumnDropped { table: stmt.table.clone(), column: stmt.column.clone() });
        Ok(batch)
    }
}

//─────────────────────────────
//  ALTER TABLE … RENAME TO
//─────────────────────────────

pub(crate) struct RenameTableGate;

impl StateGate for RenameTableGate {
    fn signature(&self) -> &'static str {
        "rename_table_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::RenameTableExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.to))
            .with_prefix(paths::table_prefix(&stmt.table))
            .with_prefix(paths::constraints_prefix(&stmt.table)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::RenameTableExecute(stmt) = event else {
            return Err(foreign("rename_table_execute", event));
        };
        let old_prefix = paths::table_prefix(&stmt.table);
        let mapping = state.prefix(&old_prefix)?;
        if mapping.is_empty() {
            return Err(Error::Schema(format!("no such table '{}'", stmt.table)));
        }
        if state.get_ref(&paths::schema_ref(&stmt.to)).is_some() {
            return Err(Error::Schema(format!("table '{}' already exists", stmt.to)));
        }

        let mut batch = MutationBatch::default();
        let schema_name = paths::schema_ref(&stmt.table);
        for (name, value) in mapping {
            let new_name = format!("{}{}", paths::table_prefix(&stmt.to), &name[old_prefix.len()..]);
            let value = if *name == schema_name {
                // The schema blob records its own table name.
                let mut schema: TableSchema = quarry_types::from_value(value)?;
                schema.name = stmt.to.clone();
                to_value(&schema)?
            } else {
                value.clone()
            };
            let put = batch.put("renamed", value);
            batch.set_ref_to_put(new_name, put);
            batch.delete_ref(name.clone());
        }

        let old_constraints = paths::constraints_prefix(&stmt.table);
        for (name, value) in state.prefix(&old_constraints)? {
            let new_name =
                format!("{}{}", paths::constraints_prefix(&stmt.to), &name[old_constraints.len()..]);
            let put = batch.put("constraint", value.clone());
            batch.set_ref_to_put(new_name, put);
            batch.delete_ref(name.clone());
        }

        batch.emit(Event::TableRenamed { from: stmt.table.clone(), to: stmt.to.clone() });
        Ok(batch)
    }
}

//─────────────────────────────
//  Constraints
//─────────────────────────────

pub(crate) struct ConstraintCreateGate;

impl StateGate for ConstraintCreateGate {
    fn signature(&self) -> &'static str {
        "constraint_create_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::ConstraintCreateExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.table))
            .with_ref(paths::constraint_ref(&stmt.table, &stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::ConstraintCreateExecute(stmt) = event else {
            return Err(foreign("constraint_create_execute", event));
        };
        schema_from_state(state, &stmt.table)?;
        let name = paths::constraint_ref(&stmt.table, &stmt.name);
        if state.get_ref(&name).is_some() {
            return Err(Error::Schema(format!(
                "constraint '{}' already exists on '{}'",
                stmt.name, stmt.table
            )));
        }
        // Persisted as metadata; enforcement is a future extension.
        let def = ConstraintDef {
            name: stmt.name.clone(),
            table: stmt.table.clone(),
            body: stmt.body.clone(),
        };
        let mut batch = MutationBatch::default();
        let put = batch.put("constraint", to_value(&def)?);
        batch.set_ref_to_put(name, put);
        batch.emit(Event::ConstraintCreated { table: stmt.table.clone(), name: stmt.name.clone() });
        Ok(batch)
    }
}

pub(crate) struct ConstraintDropGate;

impl StateGate for ConstraintDropGate {
    fn signature(&self) -> &'static str {
        "constraint_drop_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::ConstraintDropExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::constraint_ref(&stmt.table, &stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::ConstraintDropExecute(stmt) = event else {
            return Err(foreign("constraint_drop_execute", event));
        };
        let name = paths::constraint_ref(&stmt.table, &stmt.name);
        if state.get_ref(&name).is_none() {
            return Err(Error::Schema(format!(
                "no such constraint '{}' on '{}'",
                stmt.name, stmt.table
            )));
        }
        let mut batch = MutationBatch::default();
        batch.delete_ref(name);
        batch.emit(Event::ConstraintDropped { table: stmt.table.clone(), name: stmt.name.clone() });
        Ok(batch)
    }
}
