//! Dynamic value model.
//!
//! Rows are keyed mappings of column name to [`Value`]. The sum covers
//! exactly the canonicalizable set: null, boolean, integer, float, text,
//! ordered sequence and keyed mapping. Arithmetic and comparison semantics
//! over the sum live with the expression evaluator; this module only defines
//! the representation, a total cross-type ordering (so `ORDER BY` stays
//! total) and the conversions to and from `serde_json::Value` that the
//! canonical form is read back through.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A row is a keyed mapping from column name to value.
///
/// `BTreeMap` keeps keys sorted, which makes the canonical serialization of
/// a row deterministic for free.
pub type Row = BTreeMap<String, Value>;

//─────────────────────────────
//  Value sum type
//─────────────────────────────

/// Dynamic value flowing through rows, expressions and the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL / absent.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float. Non-finite floats are rejected at canonicalization.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Keyed mapping with lexicographically sorted keys.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Type name as reported by `TYPEOF`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// True only for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the value, if it is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Condition truthiness: `true`, and non-zero numbers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            _ => false,
        }
    }

    /// Render the value the way it reads in SQL text output.
    ///
    /// Text comes back unquoted; everything else matches its canonical form.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Text(s) => s.clone(),
            other => String::from_utf8_lossy(&crate::canonicalize(other).unwrap_or_default()).into_owned(),
        }
    }

    /// Total ordering across the whole sum.
    ///
    /// Values of the same type compare naturally; values of different types
    /// compare by a fixed type rank (null < boolean < numeric < text < list
    /// < map). Integers and floats share the numeric rank and compare as
    /// floats. The exact cross-type order is implementation freedom; within
    /// one type it is the natural one.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::Text(_) => 3,
                Value::List(_) => 4,
                Value::Map(_) => 5,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ if rank(self) == 2 && rank(other) == 2 => {
                let a = self.as_f64().unwrap_or(0.0);
                let b = other.as_f64().unwrap_or(0.0);
                a.total_cmp(&b)
            }
            (Value::Map(a), Value::Map(b)) => {
                let mut ai = a.iter();
                let mut bi = b.iter();
                loop {
                    match (ai.next(), bi.next()) {
                        (None, None) => return Ordering::Equal,
                        (None, Some(_)) => return Ordering::Less,
                        (Some(_), None) => return Ordering::Greater,
                        (Some((ka, va)), Some((kb, vb))) => {
                            let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                            if ord != Ordering::Equal {
                                return ord;
                            }
                        }
                    }
                }
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }

    //─────────────────────────────
    //  serde_json bridging
    //─────────────────────────────

    /// Convert from a parsed `serde_json::Value`, preserving the
    /// integer/float distinction the JSON literal carried.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
            ),
        }
    }

    /// Convert into a `serde_json::Value`. Fails on non-finite floats.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::Unserializable(format!("non-finite float {f}")))?,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(|v| v.to_json()).collect::<Result<_>>()?,
            ),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

//─────────────────────────────
//  Typed blob bridging
//─────────────────────────────

/// Serialize any serde type into a [`Value`] tree.
///
/// Persisted blob shapes (schemas, indexes, views) round-trip through this
/// so gates work with typed structs while the store only ever sees values.
pub fn to_value<T: Serialize>(t: &T) -> Result<Value> {
    let json = serde_json::to_value(t).map_err(|e| Error::Unserializable(e.to_string()))?;
    Ok(Value::from_json(json))
}

/// Deserialize a serde type back out of a [`Value`] tree.
pub fn from_value<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T> {
    let json = value.to_json()?;
    serde_json::from_value(json).map_err(|e| Error::Resolution(e.to_string()))
}

/// Wrap a row into a storable value.
pub fn row_to_value(row: &Row) -> Value {
    Value::Map(row.clone())
}

/// Unwrap a stored value back into a row.
pub fn value_to_row(value: &Value) -> Result<Row> {
    match value {
        Value::Map(map) => Ok(map.clone()),
        other => Err(Error::Resolution(format!(
            "expected a row mapping, found {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_cmp_orders_within_types() {
        assert_eq!(Value::Int(1).total_cmp(&Value::Int(2)), Ordering::Less);
        assert_eq!(
            Value::Text("a".into()).total_cmp(&Value::Text("b".into())),
            Ordering::Less
        );
        assert_eq!(Value::Int(2).total_cmp(&Value::Float(1.5)), Ordering::Greater);
    }

    #[test]
    fn nulls_rank_below_everything() {
        for v in [Value::Bool(false), Value::Int(0), Value::Text(String::new())] {
            assert_eq!(Value::Null.total_cmp(&v), Ordering::Less);
        }
    }

    #[test]
    fn json_round_trip_preserves_int_float_distinction() {
        let v = Value::List(vec![Value::Int(1), Value::Float(1.0)]);
        let back = Value::from_json(v.to_json().unwrap());
        assert_eq!(v, back);
    }

    #[test]
    fn truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Text("x".into()).is_truthy());
    }
}
