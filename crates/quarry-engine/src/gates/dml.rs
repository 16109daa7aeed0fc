//! DML execute gates: insert, insert-from-select, update, delete.
//!
//! Each declares a read set over the affected table's schema, rows and
//! indexes (plus any subquery-referenced tables), and returns a mutation
//! batch: row puts, counter advance, full index rebuild against the
//! post-mutation row set, follow-up events.

use quarry_sql::parse_select;
use quarry_sql::stmt::{ConflictAction, InsertRowStmt, Returning};
use quarry_stream::{Event, MutationBatch, ReadSet, ResolvedState, StateGate};
use quarry_types::{
    row_to_value, to_value, ColumnDef, ColumnType, Error, Result, Row, TableSchema, Value,
};

use crate::eval::{eval_condition, eval_expr, values_equal};
use crate::exec::{
    condition_read_set, merge_rows, plan_read_set, resolve_condition_against, run_plan,
};
use crate::paths;

use super::{
    complete_row, indexes_from_state, next_id_from_state, rebuild_indexes, returning_output,
    rows_from_state, schema_from_state,
};

fn foreign(gate: &str) -> Error {
    Error::Runtime(format!("gate '{gate}' received a foreign event"))
}

fn table_read_set(table: &str) -> ReadSet {
    ReadSet::new()
        .with_ref(paths::schema_ref(table))
        .with_ref(paths::next_id_ref(table))
        .with_prefix(paths::rows_prefix(table))
        .with_prefix(paths::indexes_prefix(table))
}

fn emit_returning(batch: &mut MutationBatch, returning: &Option<Returning>, rows: &[Row]) {
    if let Some(returning) = returning {
        let (rows, columns) = returning_output(rows, returning);
        batch.emit(Event::QueryResult { rows, columns });
    }
}

//─────────────────────────────
//  INSERT
//─────────────────────────────

pub(crate) struct InsertGate;

impl StateGate for InsertGate {
    fn signature(&self) -> &'static str {
        "insert_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::InsertExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(table_read_set(&stmt.table))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::InsertExecute(stmt) = event else {
            return Err(foreign("insert_execute"));
        };
        let schema = schema_from_state(state, &stmt.table)?;
        let rows = rows_from_state(state, &stmt.table)?;
        let indexes = indexes_from_state(state, &stmt.table)?;

        let supplied = supplied_row(stmt, &schema)?;

        // Upsert path
        if let Some(conflict) = &stmt.on_conflict {
            let column = conflict
                .column
                .clone()
                .or_else(|| indexes.iter().find(|(_, d)| d.unique).map(|(_, d)| d.column.clone()));
            if let Some(column) = column {
                if let Some(new_value) = supplied.get(&column) {
                    let existing = rows.iter().find(|(_, row)| {
                        row.get(&column).map(|v| values_equal(v, new_value)).unwrap_or(false)
                    });
                    if let Some((id, existing_row)) = existing {
                        return upsert(stmt, &schema, &rows, &indexes, *id, existing_row);
                    }
                }
            }
        }

        // Plain insert
        let next_id = next_id_from_state(state, &stmt.table)? + 1;
        let row = complete_row(&schema, &supplied, next_id)?;

        for (name, def) in &indexes {
            if !def.unique {
                continue;
            }
            let value = row.get(&def.column).cloned().unwrap_or(Value::Null);
            if value.is_null() {
                continue;
            }
            let taken = def
                .entries
                .iter()
                .any(|e| values_equal(&e.key, &value) && !e.row_ids.is_empty());
            if taken {
                return Err(Error::Integrity(format!(
                    "duplicate key {} for unique index '{}'",
                    value.display_string(),
                    name
                )));
            }
        }

        let mut batch = MutationBatch::default();
        let row_put = batch.put("row", row_to_value(&row));
        batch.set_ref_to_put(paths::row_ref(&stmt.table, next_id), row_put);
        let counter_put = batch.put("next_id", Value::Text(next_id.to_string()));
        batch.set_ref_to_put(paths::next_id_ref(&stmt.table), counter_put);

        let mut all_rows = rows;
        all_rows.push((next_id, row.clone()));
        rebuild_indexes(&mut batch, &stmt.table, &indexes, &all_rows)?;

        batch.emit(Event::RowInserted { table: stmt.table.clone(), id: next_id, conflict: None });
        emit_returning(&mut batch, &stmt.returning, &[row]);
        Ok(batch)
    }
}

/// Map a positional tuple onto the schema's column order, or pass the named
/// row through.
fn supplied_row(stmt: &InsertRowStmt, schema: &TableSchema) -> Result<Row> {
    match &stmt.positional {
        None => Ok(stmt.row.clone()),
        Some(values) => {
            if values.len() > schema.columns.len() {
                return Err(Error::Schema(format!(
                    "{} values for {} columns in '{}'",
                    values.len(),
                    schema.columns.len(),
                    stmt.table
                )));
            }
            Ok(schema
                .columns
                .iter()
                .zip(values.iter().cloned())
                .map(|(c, v)| (c.name.clone(), v))
                .collect())
        }
    }
}

fn upsert(
    stmt: &InsertRowStmt,
    schema: &TableSchema,
    rows: &[(i64, Row)],
    indexes: &[(String, quarry_types::IndexDef)],
    id: i64,
    existing: &Row,
) -> Result<MutationBatch> {
    let action = &stmt.on_conflict.as_ref().expect("conflict clause present").action;
    match action {
        ConflictAction::Nothing => {
            let mut batch = MutationBatch::default();
            batch.emit(Event::RowInserted {
                table: stmt.table.clone(),
                id,
                conflict: Some("skipped".into()),
            });
            Ok(batch)
        }
        ConflictAction::Update(sets) => {
            // Changes evaluate against the existing row.
            let mut updated = existing.clone();
            for (column, expr) in sets {
                if schema.column(column).is_none() {
                    return Err(Error::Schema(format!(
                        "no such column '{}' in '{}'",
                        column, stmt.table
                    )));
                }
                updated.insert(column.clone(), eval_expr(expr, existing)?);
            }

            let mut batch = MutationBatch::default();
            let put = batch.put("row", row_to_value(&updated));
            batch.set_ref_to_put(paths::row_ref(&stmt.table, id), put);

            let all_rows: Vec<(i64, Row)> = rows
                .iter()
                .map(|(rid, r)| if *rid == id { (*rid, updated.clone()) } else { (*rid, r.clone()) })
                .collect();
            rebuild_indexes(&mut batch, &stmt.table, indexes, &all_rows)?;

            batch.emit(Event::RowInserted {
                table: stmt.table.clone(),
                id,
                conflict: Some("updated".into()),
            });
            emit_returning(&mut batch, &stmt.returning, &[updated]);
            Ok(batch)
        }
    }
}

//─────────────────────────────
//  INSERT … SELECT / CREATE TABLE … AS SELECT
//─────────────────────────────

pub(crate) struct InsertSelectGate;

impl StateGate for InsertSelectGate {
    fn signature(&self) -> &'static str {
        "insert_select"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::InsertSelect(stmt) = event else {
            return Ok(ReadSet::new());
        };
        let mut rs = table_read_set(&stmt.table);
        let plan = parse_select(&stmt.select_tokens, Vec::new())?;
        rs.merge(plan_read_set(&plan));
        Ok(rs)
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::InsertSelect(stmt) = event else {
            return Err(foreign("insert_select"));
        };
        let plan = parse_select(&stmt.select_tokens, Vec::new())?;
        let output = run_plan(&plan, state)?;

        let mut batch = MutationBatch::default();
        let (schema, mut next_id) = if stmt.create_table {
            if state.get_ref(&paths::schema_ref(&stmt.table)).is_some() {
                return Err(Error::Schema(format!("table '{}' already exists", stmt.table)));
            }
            // Infer text columns from the result shape.
            let inferred: Vec<String> = if output.columns.is_empty() {
                output
                    .rows
                    .first()
                    .map(|r| r.keys().filter(|k| !k.contains('.')).cloned().collect())
                    .unwrap_or_default()
            } else {
                output.columns.clone()
            };
            let schema = TableSchema {
                name: stmt.table.clone(),
                columns: inferred
                    .iter()
                    .filter(|c| c.as_str() != "id")
                    .map(|c| ColumnDef {
                        name: c.clone(),
                        ty: ColumnType::Text,
                        nullable: true,
                        default: None,
                    })
                    .collect(),
            };
            let put = batch.put("schema", to_value(&schema)?);
            batch.set_ref_to_put(paths::schema_ref(&stmt.table), put);
            batch.emit(Event::TableCreated { table: stmt.table.clone() });
            (schema, 0)
        } else {
            (schema_from_state(state, &stmt.table)?, next_id_from_state(state, &stmt.table)?)
        };

        let existing = if stmt.create_table {
            Vec::new()
        } else {
            rows_from_state(state, &stmt.table)?
        };
        let indexes = if stmt.create_table {
            Vec::new()
        } else {
            indexes_from_state(state, &stmt.table)?
        };

        let mut all_rows = existing;
        for src in &output.rows {
            let mut supplied = Row::new();
            if stmt.columns.is_empty() {
                for (k, v) in src.iter().filter(|(k, _)| !k.contains('.') && k.as_str() != "id") {
                    if schema.column(k).is_some() {
                        supplied.insert(k.clone(), v.clone());
                    }
                }
            } else {
                // Explicit target columns map positionally onto the
                // select's output columns.
                for (i, target) in stmt.columns.iter().enumerate() {
                    let value = output
                        .columns
                        .get(i)
                        .map(|c| crate::eval::lookup(src, c))
                        .unwrap_or(Value::Null);
                    supplied.insert(target.clone(), value);
                }
            }
            next_id += 1;
            let row = complete_row(&schema, &supplied, next_id)?;
            let put = batch.put("row", row_to_value(&row));
            batch.set_ref_to_put(paths::row_ref(&stmt.table, next_id), put);
            batch.emit(Event::RowInserted { table: stmt.table.clone(), id: next_id, conflict: None });
            all_rows.push((next_id, row));
        }

        let counter_put = batch.put("next_id", Value::Text(next_id.to_string()));
        batch.set_ref_to_put(paths::next_id_ref(&stmt.table), counter_put);
        rebuild_indexes(&mut batch, &stmt.table, &indexes, &all_rows)?;
        Ok(batch)
    }
}

//─────────────────────────────
//  UPDATE
//─────────────────────────────

pub(crate) struct UpdateGate;

impl StateGate for UpdateGate {
    fn signature(&self) -> &'static str {
        "update_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::UpdateExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        let mut rs = table_read_set(&stmt.table);
        if let Some(from) = &stmt.from_table {
            rs.merge(ReadSet::new().with_prefix(paths::rows_prefix(from)));
        }
        if let Some(cond) = &stmt.where_cond {
            rs.merge(condition_read_set(cond));
        }
        Ok(rs)
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::UpdateExecute(stmt) = event else {
            return Err(foreign("update_execute"));
        };
        let schema = schema_from_state(state, &stmt.table)?;
        let rows = rows_from_state(state, &stmt.table)?;
        let indexes = indexes_from_state(state, &stmt.table)?;

        for column in stmt.changes.keys().chain(stmt.changes_exprs.iter().map(|(c, _)| c)) {
            if schema.column(column).is_none() {
                return Err(Error::Schema(format!(
                    "no such column '{}' in '{}'",
                    column, stmt.table
                )));
            }
        }

        let where_cond = match &stmt.where_cond {
            Some(cond) => Some(resolve_condition_against(cond, state)?),
            None => None,
        };

        // Target selection: each target pairs the row id with the
        // evaluation context its changes see.
        let mut targets: Vec<(i64, Row)> = Vec::new();
        if let Some(from_table) = &stmt.from_table {
            let from_rows = rows_from_state(state, from_table)?;
            let from_alias = stmt.from_alias.as_deref().unwrap_or(from_table);
            for (id, row) in &rows {
                for (_, from_row) in &from_rows {
                    let merged = merge_rows(row, Some(&stmt.table), from_row, from_alias);
                    let hit = match &where_cond {
                        Some(cond) => eval_condition(cond, &merged)?,
                        None => true,
                    };
                    if hit {
                        targets.push((*id, merged));
                    }
                }
            }
        } else {
            for (id, row) in &rows {
                let hit = match &where_cond {
                    Some(cond) => eval_condition(cond, row)?,
                    None => true,
                };
                if hit {
                    targets.push((*id, row.clone()));
                }
            }
        }

        let mut batch = MutationBatch::default();
        let mut updated_rows = rows.clone();
        let mut result_rows = Vec::with_capacity(targets.len());
        let mut ids = Vec::new();
        for (id, context) in &targets {
            let original = updated_rows
                .iter()
                .find(|(rid, _)| rid == id)
                .map(|(_, r)| r.clone())
                .ok_or_else(|| Error::Resolution(format!("target row {id} vanished")))?;
            let mut new_row = original;
            for (column, value) in &stmt.changes {
                new_row.insert(column.clone(), value.clone());
            }
            for (column, expr) in &stmt.changes_exprs {
                new_row.insert(column.clone(), eval_expr(expr, context)?);
            }
            for (rid, row) in &mut updated_rows {
                if rid == id {
                    *row = new_row.clone();
                }
            }
            if !ids.contains(id) {
                ids.push(*id);
            }
            result_rows.push(new_row);
        }

        for id in &ids {
            let row = updated_rows
                .iter()
                .find(|(rid, _)| rid == id)
                .map(|(_, r)| r.clone())
                .expect("updated row present");
            let put = batch.put("row", row_to_value(&row));
            batch.set_ref_to_put(paths::row_ref(&stmt.table, *id), put);
        }
        rebuild_indexes(&mut batch, &stmt.table, &indexes, &updated_rows)?;

        batch.emit(Event::RowUpdated { table: stmt.table.clone(), ids });
        emit_returning(&mut batch, &stmt.returning, &result_rows);
        Ok(batch)
    }
}

//─────────────────────────────
//  DELETE (and TRUNCATE)
//─────────────────────────────

pub(crate) struct DeleteGate;

impl StateGate for DeleteGate {
    fn signature(&self) -> &'static str {
        "delete_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::DeleteExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        let mut rs = ReadSet::new()
            .with_ref(paths::schema_ref(&stmt.table))
            .with_prefix(paths::rows_prefix(&stmt.table))
            .with_prefix(paths::indexes_prefix(&stmt.table));
        if let Some(cond) = &stmt.where_cond {
            rs.merge(condition_read_set(cond));
        }
        Ok(rs)
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::DeleteExecute(stmt) = event else {
            return Err(foreign("delete_execute"));
        };
        schema_from_state(state, &stmt.table)?;
        let rows = rows_from_state(state, &stmt.table)?;
        let indexes = indexes_from_state(state, &stmt.table)?;

        let where_cond = match &stmt.where_cond {
            Some(cond) => Some(resolve_condition_against(cond, state)?),
            None => None,
        };

        let mut deleted: Vec<(i64, Row)> = Vec::new();
        let mut remaining: Vec<(i64, Row)> = Vec::new();
        for (id, row) in rows {
            let hit = match (stmt.id, &where_cond) {
                (Some(target), _) => id == target,
                (None, Some(cond)) => eval_condition(cond, &row)?,
                (None, None) => true,
            };
            if hit {
                deleted.push((id, row));
            } else {
                remaining.push((id, row));
            }
        }

        let mut batch = MutationBatch::default();
        for (id, _) in &deleted {
            batch.delete_ref(paths::row_ref(&stmt.table, *id));
        }
        rebuild_indexes(&mut batch, &stmt.table, &indexes, &remaining)?;

        let ids: Vec<i64> = deleted.iter().map(|(id, _)| *id).collect();
        let deleted_rows: Vec<Row> = deleted.into_iter().map(|(_, r)| r).collect();
        batch.emit(Event::RowDeleted { table: stmt.table.clone(), ids });
        emit_returning(&mut batch, &stmt.returning, &deleted_rows);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_sql::plan::{CmpOp, Condition, Expr};
    use quarry_sql::stmt::OnConflict;
    use quarry_stream::RefTarget;

    fn insert_stmt(table: &str, pairs: &[(&str, Value)]) -> InsertRowStmt {
        InsertRowStmt {
            table: table.into(),
            row: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            positional: None,
            on_conflict: None,
            returning: None,
        }
    }

    fn seeded_state() -> ResolvedState {
        // users table: schema, counter at 1, one row, no indexes.
        let mut state = ResolvedState::default();
        let schema = TableSchema {
            name: "users".into(),
            columns: vec![ColumnDef {
                name: "name".into(),
                ty: ColumnType::Text,
                nullable: false,
                default: None,
            }],
        };
        state
            .refs
            .insert(paths::schema_ref("users"), Some(to_value(&schema).unwrap()));
        state
            .refs
            .insert(paths::next_id_ref("users"), Some(Value::Text("1".into())));
        let mut rows = indexmap::IndexMap::new();
        let row = Row::from([
            ("id".to_string(), Value::Int(1)),
            ("name".to_string(), Value::Text("Alice".into())),
        ]);
        rows.insert(paths::row_ref("users", 1), row_to_value(&row));
        state.prefixes.insert(paths::rows_prefix("users"), rows);
        state
            .prefixes
            .insert(paths::indexes_prefix("users"), indexmap::IndexMap::new());
        state
    }

    #[test]
    fn insert_advances_counter_and_emits() {
        let state = seeded_state();
        let stmt = insert_stmt("users", &[("name", Value::Text("Bob".into()))]);
        let batch = InsertGate.apply(&Event::InsertExecute(stmt), &state).unwrap();

        assert!(batch
            .ref_sets
            .iter()
            .any(|r| r.name == paths::row_ref("users", 2) && matches!(r.target, RefTarget::Put(_))));
        assert!(batch.ref_sets.iter().any(|r| r.name == paths::next_id_ref("users")));
        assert!(matches!(
            batch.events[0],
            Event::RowInserted { id: 2, conflict: None, .. }
        ));
    }

    #[test]
    fn insert_missing_not_null_is_integrity_violation() {
        let state = seeded_state();
        let stmt = insert_stmt("users", &[]);
        let err = InsertGate.apply(&Event::InsertExecute(stmt), &state).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn insert_unknown_table_is_schema_violation() {
        let state = ResolvedState::default();
        let stmt = insert_stmt("ghost", &[]);
        let mut state2 = state;
        state2.refs.insert(paths::schema_ref("ghost"), None);
        state2.prefixes.insert(paths::rows_prefix("ghost"), indexmap::IndexMap::new());
        state2.prefixes.insert(paths::indexes_prefix("ghost"), indexmap::IndexMap::new());
        let err = InsertGate.apply(&Event::InsertExecute(stmt), &state2).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn upsert_do_nothing_skips() {
        let state = seeded_state();
        let mut stmt = insert_stmt("users", &[("name", Value::Text("Alice".into()))]);
        stmt.on_conflict = Some(OnConflict {
            column: Some("name".into()),
            action: ConflictAction::Nothing,
        });
        let batch = InsertGate.apply(&Event::InsertExecute(stmt), &state).unwrap();
        assert!(batch.puts.is_empty());
        assert!(matches!(
            &batch.events[0],
            Event::RowInserted { id: 1, conflict: Some(c), .. } if c == "skipped"
        ));
    }

    #[test]
    fn delete_all_serves_truncate() {
        let state = seeded_state();
        let stmt = quarry_sql::stmt::DeleteStmt {
            table: "users".into(),
            id: None,
            where_cond: None,
            returning: None,
        };
        let batch = DeleteGate.apply(&Event::DeleteExecute(stmt), &state).unwrap();
        assert_eq!(batch.ref_deletes, vec![paths::row_ref("users", 1)]);
        assert!(matches!(&batch.events[0], Event::RowDeleted { ids, .. } if ids == &vec![1]));
    }

    #[test]
    fn update_by_condition_changes_and_reports_ids() {
        let state = seeded_state();
        let stmt = quarry_sql::stmt::UpdateStmt {
            table: "users".into(),
            changes: Row::from([("name".to_string(), Value::Text("Alicia".into()))]),
            changes_exprs: vec![(
                "name".into(),
                Expr::Call {
                    name: "UPPER".into(),
                    args: vec![Expr::Column("name".into())],
                },
            )],
            where_cond: Some(Condition::Simple {
                column: "name".into(),
                op: CmpOp::Eq,
                value: Value::Text("Alice".into()),
            }),
            from_table: None,
            from_alias: None,
            returning: Some(Returning::All),
        };
        let batch = UpdateGate.apply(&Event::UpdateExecute(stmt), &state).unwrap();
        assert!(matches!(&batch.events[0], Event::RowUpdated { ids, .. } if ids == &vec![1]));
        // Expression change evaluates against the original row context.
        match &batch.events[1] {
            Event::QueryResult { rows, .. } => {
                assert_eq!(rows[0].get("name"), Some(&Value::Text("ALICE".into())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
