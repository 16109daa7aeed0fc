//! Persisted blob shapes.
//!
//! Everything the engine keeps under the `db/` ref namespace round-trips
//! through these structs via [`crate::value::to_value`] /
//! [`crate::value::from_value`], so the store itself only ever sees plain
//! values.

use serde::{Deserialize, Serialize};

use crate::Value;

/// Column type, normalized from the richer SQL type keyword surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Whole numbers (`INTEGER`, `INT`, `BIGINT`, `SMALLINT`, `SERIAL`).
    Integer,
    /// Character data (`TEXT`, `VARCHAR`, `CHAR`).
    Text,
    /// Floating point (`REAL`, `FLOAT`, `DOUBLE`, `DECIMAL`, `NUMERIC`).
    Real,
    /// Booleans.
    Boolean,
    /// Opaque bytes.
    Blob,
    /// Calendar date.
    Date,
    /// Date and time.
    Timestamp,
}

impl ColumnType {
    /// Normalize a SQL type keyword. Returns `None` for unknown words.
    pub fn from_keyword(word: &str) -> Option<ColumnType> {
        match word.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "SERIAL" => Some(ColumnType::Integer),
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" => Some(ColumnType::Text),
            "REAL" | "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Some(ColumnType::Real),
            "BOOLEAN" | "BOOL" => Some(ColumnType::Boolean),
            "BLOB" | "BYTEA" => Some(ColumnType::Blob),
            "DATE" => Some(ColumnType::Date),
            "TIMESTAMP" | "DATETIME" => Some(ColumnType::Timestamp),
            _ => None,
        }
    }
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, case preserved.
    pub name: String,
    /// Normalized type.
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Whether NULL is accepted. `PRIMARY KEY` implies not-null.
    pub nullable: bool,
    /// Literal default applied when an insert omits the column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Schema blob stored at `db/tables/{T}/schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Declared columns. The synthetic `id` column is not listed here.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Look up a declared column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One key bucket inside an index blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Indexed column value.
    pub key: Value,
    /// Ids of the rows carrying that value.
    pub row_ids: Vec<i64>,
}

/// Index blob stored at `db/tables/{T}/indexes/{I}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Indexed column.
    pub column: String,
    /// Whether each key admits at most one row.
    pub unique: bool,
    /// Flat entry list, one bucket per distinct key.
    pub entries: Vec<IndexEntry>,
}

/// View blob stored at `db/views/{V}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDef {
    /// View name.
    pub name: String,
    /// The defining query text, verbatim.
    pub query: String,
    /// Declared output columns, empty when not declared.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Trigger blob stored at `db/triggers/{N}`.
///
/// Bodies are persisted verbatim and never fired; execution is a future
/// extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
    /// Trigger name.
    pub name: String,
    /// Table the trigger is attached to.
    pub table: String,
    /// `BEFORE` or `AFTER`.
    pub timing: String,
    /// `INSERT`, `UPDATE` or `DELETE`.
    pub event: String,
    /// Action body, verbatim SQL text.
    pub body: String,
}

/// Constraint blob stored at `db/constraints/{T}/{N}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDef {
    /// Constraint name.
    pub name: String,
    /// Table the constraint belongs to.
    pub table: String,
    /// Constraint body, verbatim (e.g. `CHECK (age > 0)`).
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{from_value, to_value};

    #[test]
    fn schema_blob_round_trips_through_value() {
        let schema = TableSchema {
            name: "users".into(),
            columns: vec![
                ColumnDef {
                    name: "name".into(),
                    ty: ColumnType::Text,
                    nullable: false,
                    default: None,
                },
                ColumnDef {
                    name: "age".into(),
                    ty: ColumnType::Integer,
                    nullable: true,
                    default: Some(Value::Int(0)),
                },
            ],
        };
        let blob = to_value(&schema).unwrap();
        let back: TableSchema = from_value(&blob).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn type_keywords_normalize() {
        assert_eq!(ColumnType::from_keyword("varchar"), Some(ColumnType::Text));
        assert_eq!(ColumnType::from_keyword("BIGINT"), Some(ColumnType::Integer));
        assert_eq!(ColumnType::from_keyword("datetime"), Some(ColumnType::Timestamp));
        assert_eq!(ColumnType::from_keyword("geometry"), None);
    }
}
