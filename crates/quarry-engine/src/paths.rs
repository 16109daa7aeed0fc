//! Ref-name layout of the database namespace.
//!
//! ```text
//! db/tables/{T}/schema        schema blob
//! db/tables/{T}/next_id       counter blob (string integer)
//! db/tables/{T}/rows/{id}     row blob
//! db/tables/{T}/indexes/{I}   index blob
//! db/views/{V}                view blob
//! db/triggers/{N}             trigger blob
//! db/constraints/{T}/{N}      constraint blob
//! ```

/// Prefix covering everything a table owns.
pub fn table_prefix(table: &str) -> String {
    format!("db/tables/{table}/")
}

/// The schema ref of a table.
pub fn schema_ref(table: &str) -> String {
    format!("db/tables/{table}/schema")
}

/// The id counter ref of a table.
pub fn next_id_ref(table: &str) -> String {
    format!("db/tables/{table}/next_id")
}

/// Prefix covering a table's rows.
pub fn rows_prefix(table: &str) -> String {
    format!("db/tables/{table}/rows/")
}

/// The ref of one row.
pub fn row_ref(table: &str, id: i64) -> String {
    format!("db/tables/{table}/rows/{id}")
}

/// Prefix covering a table's indexes.
pub fn indexes_prefix(table: &str) -> String {
    format!("db/tables/{table}/indexes/")
}

/// The ref of one index.
pub fn index_ref(table: &str, name: &str) -> String {
    format!("db/tables/{table}/indexes/{name}")
}

/// The ref of a view.
pub fn view_ref(name: &str) -> String {
    format!("db/views/{name}")
}

/// The ref of a trigger.
pub fn trigger_ref(name: &str) -> String {
    format!("db/triggers/{name}")
}

/// Prefix covering a table's constraints.
pub fn constraints_prefix(table: &str) -> String {
    format!("db/constraints/{table}/")
}

/// The ref of one constraint.
pub fn constraint_ref(table: &str, name: &str) -> String {
    format!("db/constraints/{table}/{name}")
}

/// Row id parsed back out of a rows ref name.
pub fn id_from_row_ref(name: &str) -> Option<i64> {
    name.rsplit('/').next()?.parse().ok()
}

/// Index name parsed back out of an indexes ref name.
pub fn name_from_index_ref(name: &str) -> Option<&str> {
    name.rsplit('/').next()
}
