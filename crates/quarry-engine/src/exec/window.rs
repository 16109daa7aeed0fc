//! Window step.
//!
//! For each window function: partition rows by the PARTITION BY key tuple,
//! sort within each partition by the window's ORDER BY, and assign per-row
//! values. Row order outside the window is preserved; values are written
//! into the rows by index.

use indexmap::IndexMap;

use quarry_sql::plan::{WinFunc, WinSpec};
use quarry_types::{canonicalize, Result, Row, Value};

use crate::eval::{eval_expr, lookup};

use super::{ops, ExecOutput};

/// Apply every window function, mutating rows in place.
pub fn apply(out: &mut ExecOutput, funcs: &[WinSpec]) -> Result<()> {
    for spec in funcs {
        apply_one(&mut out.rows, spec)?;
        out.columns.push(spec.alias.clone());
    }
    Ok(())
}

fn apply_one(rows: &mut [Row], spec: &WinSpec) -> Result<()> {
    // Partition row indices, preserving encounter order.
    let mut partitions: IndexMap<Vec<u8>, Vec<usize>> = IndexMap::new();
    for (i, row) in rows.iter().enumerate() {
        let mut key = Vec::new();
        for col in &spec.partition_by {
            key.extend(canonicalize(&lookup(row, col))?);
            key.push(0x1f);
        }
        partitions.entry(key).or_default().push(i);
    }

    for (_, mut indices) in partitions {
        // Order within the partition by the window's ORDER BY.
        if !spec.order_by.is_empty() {
            let mut keyed: Vec<Row> = indices.iter().map(|&i| rows[i].clone()).collect();
            // Tag each clone with its source index so the stable sort
            // yields a sorted index list.
            for (pos, row) in keyed.iter_mut().enumerate() {
                row.insert("\u{0}idx".into(), Value::Int(indices[pos] as i64));
            }
            ops::order_by(&mut keyed, &spec.order_by);
            indices = keyed
                .iter()
                .map(|r| r.get("\u{0}idx").and_then(Value::as_int).unwrap_or(0) as usize)
                .collect();
        }

        match spec.func {
            WinFunc::RowNumber => {
                for (pos, &i) in indices.iter().enumerate() {
                    rows[i].insert(spec.alias.clone(), Value::Int(pos as i64 + 1));
                }
            }
            WinFunc::Rank | WinFunc::DenseRank => {
                let mut rank = 0i64;
                let mut dense = 0i64;
                let mut prev_key: Option<Vec<u8>> = None;
                for (pos, &i) in indices.iter().enumerate() {
                    let key = peer_key(&rows[i], spec)?;
                    if prev_key.as_ref() != Some(&key) {
                        rank = pos as i64 + 1;
                        dense += 1;
                        prev_key = Some(key);
                    }
                    let v = if spec.func == WinFunc::Rank { rank } else { dense };
                    rows[i].insert(spec.alias.clone(), Value::Int(v));
                }
            }
            WinFunc::Sum | WinFunc::Avg | WinFunc::Count | WinFunc::Min | WinFunc::Max => {
                let mut values = Vec::with_capacity(indices.len());
                for &i in &indices {
                    match &spec.arg {
                        Some(arg) => values.push(eval_expr(arg, &rows[i])?),
                        None => values.push(Value::Int(1)),
                    }
                }
                let folded = fold(spec.func, &values, indices.len());
                for &i in &indices {
                    rows[i].insert(spec.alias.clone(), folded.clone());
                }
            }
        }
    }
    Ok(())
}

/// Peer groups are detected by equal ORDER BY tuples.
fn peer_key(row: &Row, spec: &WinSpec) -> Result<Vec<u8>> {
    let mut key = Vec::new();
    for k in &spec.order_by {
        key.extend(canonicalize(&lookup(row, &k.column))?);
        key.push(0x1f);
    }
    Ok(key)
}

fn fold(func: WinFunc, values: &[Value], partition_len: usize) -> Value {
    let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    match func {
        WinFunc::Count => Value::Int(if values.iter().all(|v| matches!(v, Value::Int(1))) {
            partition_len as i64
        } else {
            values.iter().filter(|v| !v.is_null()).count() as i64
        }),
        WinFunc::Sum => {
            if nums.is_empty() {
                Value::Null
            } else if values.iter().all(|v| !matches!(v, Value::Float(_))) {
                Value::Int(values.iter().filter_map(Value::as_int).sum())
            } else {
                Value::Float(nums.iter().sum())
            }
        }
        WinFunc::Avg => {
            if nums.is_empty() {
                Value::Null
            } else {
                Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        WinFunc::Min => values
            .iter()
            .filter(|v| !v.is_null())
            .min_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        WinFunc::Max => values
            .iter()
            .filter(|v| !v.is_null())
            .max_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        WinFunc::RowNumber | WinFunc::Rank | WinFunc::DenseRank => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_sql::plan::{Expr, OrderKey};

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn emp() -> ExecOutput {
        ExecOutput::from_rows(vec![
            row(&[("dept", Value::Text("a".into())), ("salary", Value::Int(10))]),
            row(&[("dept", Value::Text("b".into())), ("salary", Value::Int(30))]),
            row(&[("dept", Value::Text("a".into())), ("salary", Value::Int(20))]),
            row(&[("dept", Value::Text("a".into())), ("salary", Value::Int(20))]),
        ])
    }

    fn spec(func: WinFunc, alias: &str) -> WinSpec {
        WinSpec {
            func,
            arg: None,
            partition_by: vec!["dept".into()],
            order_by: vec![OrderKey { column: "salary".into(), desc: true, nulls_first: None }],
            alias: alias.into(),
        }
    }

    #[test]
    fn row_number_per_partition_preserves_outer_order() {
        let mut out = emp();
        apply(&mut out, &[spec(WinFunc::RowNumber, "rn")]).unwrap();
        // Outer order unchanged: dept a,b,a,a.
        assert_eq!(out.rows[0].get("dept"), Some(&Value::Text("a".into())));
        // Highest salary in dept a gets rn 1.
        assert_eq!(out.rows[0].get("rn"), Some(&Value::Int(3)));
        assert_eq!(out.rows[1].get("rn"), Some(&Value::Int(1)));
        assert_eq!(out.rows[2].get("rn"), Some(&Value::Int(1)));
        assert_eq!(out.rows[3].get("rn"), Some(&Value::Int(2)));
    }

    #[test]
    fn rank_and_dense_rank_detect_peers() {
        let mut out = emp();
        apply(&mut out, &[spec(WinFunc::Rank, "r"), spec(WinFunc::DenseRank, "dr")]).unwrap();
        // dept a salaries desc: 20, 20, 10 -> rank 1,1,3; dense 1,1,2.
        assert_eq!(out.rows[2].get("r"), Some(&Value::Int(1)));
        assert_eq!(out.rows[3].get("r"), Some(&Value::Int(1)));
        assert_eq!(out.rows[0].get("r"), Some(&Value::Int(3)));
        assert_eq!(out.rows[0].get("dr"), Some(&Value::Int(2)));
    }

    #[test]
    fn partition_aggregates_assign_per_row() {
        let mut out = emp();
        let s = WinSpec {
            func: WinFunc::Sum,
            arg: Some(Expr::Column("salary".into())),
            partition_by: vec!["dept".into()],
            order_by: Vec::new(),
            alias: "dept_total".into(),
        };
        apply(&mut out, &[s]).unwrap();
        assert_eq!(out.rows[0].get("dept_total"), Some(&Value::Int(50)));
        assert_eq!(out.rows[1].get("dept_total"), Some(&Value::Int(30)));
    }
}
