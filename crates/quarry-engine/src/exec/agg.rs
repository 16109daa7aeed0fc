//! Aggregate step.
//!
//! Partitions rows by the GROUP BY key tuple (no GROUP BY = one group, even
//! over zero rows), folds each aggregate, and emits one row per group: the
//! group-by columns (prefix-stripped) plus aggregate aliases. Each
//! aggregate also writes its uppercase textual form (`SUM(amount)`) as a
//! synthetic key so a HAVING clause can reference it by spelling.

use std::collections::HashSet;

use indexmap::IndexMap;

use quarry_sql::plan::{AggFunc, AggSpec};
use quarry_types::{canonicalize, Result, Row, Value};

use crate::eval::{eval_expr, lookup};

use super::ExecOutput;

/// Run the aggregate step.
pub fn aggregate(input: ExecOutput, group_by: &[String], aggs: &[AggSpec]) -> Result<ExecOutput> {
    // Group rows, preserving first-seen group order.
    let mut groups: IndexMap<Vec<u8>, (Vec<(String, Value)>, Vec<Row>)> = IndexMap::new();
    if group_by.is_empty() {
        groups.insert(Vec::new(), (Vec::new(), input.rows));
    } else {
        for row in input.rows {
            let mut key_values = Vec::with_capacity(group_by.len());
            let mut key_bytes = Vec::new();
            for col in group_by {
                let v = lookup(&row, col);
                key_bytes.extend(canonicalize(&v)?);
                key_bytes.push(0x1f);
                let stripped = col.rsplit('.').next().unwrap_or(col).to_string();
                key_values.push((stripped, v));
            }
            groups.entry(key_bytes).or_insert_with(|| (key_values, Vec::new())).1.push(row);
        }
    }

    let mut columns: Vec<String> = group_by
        .iter()
        .map(|c| c.rsplit('.').next().unwrap_or(c).to_string())
        .collect();
    for agg in aggs {
        columns.push(agg.alias.clone());
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (_, (key_values, group_rows)) in groups {
        let mut out = Row::new();
        for (name, value) in key_values {
            out.insert(name, value);
        }
        for agg in aggs {
            let value = fold(agg, &group_rows)?;
            // Synthetic key first so an alias with the same spelling wins.
            out.insert(agg.display.clone(), value.clone());
            out.insert(agg.alias.clone(), value);
        }
        rows.push(out);
    }
    Ok(ExecOutput { rows, columns })
}

fn fold(agg: &AggSpec, rows: &[Row]) -> Result<Value> {
    // COUNT(*) counts rows; everything else folds evaluated arguments.
    let mut values: Vec<Value> = Vec::with_capacity(rows.len());
    if let Some(arg) = &agg.arg {
        for row in rows {
            values.push(eval_expr(arg, row)?);
        }
        if agg.distinct {
            let mut seen = HashSet::new();
            let mut unique = Vec::with_capacity(values.len());
            for v in values {
                if seen.insert(canonicalize(&v)?) {
                    unique.push(v);
                }
            }
            values = unique;
        }
    }

    Ok(match agg.func {
        AggFunc::Count => match &agg.arg {
            None => Value::Int(rows.len() as i64),
            Some(_) => Value::Int(values.iter().filter(|v| !v.is_null()).count() as i64),
        },
        AggFunc::Sum => {
            let nums = numeric(&values);
            if nums.is_empty() {
                Value::Null
            } else if values.iter().all(|v| !matches!(v, Value::Float(_))) {
                Value::Int(values.iter().filter_map(Value::as_int).sum())
            } else {
                Value::Float(nums.iter().sum())
            }
        }
        AggFunc::Avg => {
            let nums = numeric(&values);
            if nums.is_empty() {
                Value::Null
            } else {
                Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        AggFunc::Min => values
            .iter()
            .filter(|v| !v.is_null())
            .min_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        AggFunc::Max => values
            .iter()
            .filter(|v| !v.is_null())
            .max_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        AggFunc::GroupConcat => {
            let sep = agg.separator.as_deref().unwrap_or(",");
            let pieces: Vec<String> = values
                .iter()
                .filter(|v| !v.is_null())
                .map(Value::display_string)
                .collect();
            if pieces.is_empty() {
                Value::Null
            } else {
                Value::Text(pieces.join(sep))
            }
        }
    })
}

/// Numeric views only; non-numeric and null are ignored.
fn numeric(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}
