//! Plain row operators: project, order_by, limit, distinct.
//!
//! All pure: equal inputs produce equal outputs regardless of state.

use std::collections::HashSet;

use quarry_sql::plan::{OrderKey, ProjColumn};
use quarry_types::{Result, Row, Value};

use crate::eval::{eval_expr, lookup, row_key, row_key_of};

use super::ExecOutput;

/// Project each row to the requested output columns. Qualified dot-notation
/// is stripped for the output key unless an alias overrides it; a column
/// missing from a row projects as Null (which is also what null-fills the
/// outer side of joins).
pub fn project(input: ExecOutput, columns: &[ProjColumn]) -> Result<ExecOutput> {
    let mut out_columns: Vec<String> = Vec::new();
    for col in columns {
        match col {
            ProjColumn::Star => {
                if let Some(first) = input.rows.first() {
                    out_columns.extend(first.keys().filter(|k| !k.contains('.')).cloned());
                }
            }
            ProjColumn::Column { name, alias } => out_columns.push(output_key(name, alias.as_deref())),
            ProjColumn::Expr { alias, .. } => out_columns.push(alias.clone()),
        }
    }

    let mut rows = Vec::with_capacity(input.rows.len());
    for row in &input.rows {
        let mut out = Row::new();
        for col in columns {
            match col {
                ProjColumn::Star => {
                    for (k, v) in row.iter().filter(|(k, _)| !k.contains('.')) {
                        out.insert(k.clone(), v.clone());
                    }
                }
                ProjColumn::Column { name, alias } => {
                    out.insert(output_key(name, alias.as_deref()), lookup(row, name));
                }
                ProjColumn::Expr { expr, alias } => {
                    out.insert(alias.clone(), eval_expr(expr, row)?);
                }
            }
        }
        rows.push(out);
    }
    Ok(ExecOutput { rows, columns: out_columns })
}

fn output_key(name: &str, alias: Option<&str>) -> String {
    match alias {
        Some(a) => a.to_string(),
        // Strip a table qualifier, but leave call-shaped names (aggregate
        // display forms like SUM(s.amount)) untouched.
        None if name.contains('(') => name.to_string(),
        None => name.rsplit('.').next().unwrap_or(name).to_string(),
    }
}

/// Stable multi-key sort. Direction per key; NULLS LAST unless the key says
/// otherwise, and null placement is not affected by DESC.
pub fn order_by(rows: &mut [Row], keys: &[OrderKey]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let av = lookup(a, &key.column);
            let bv = lookup(b, &key.column);
            let nulls_first = key.nulls_first.unwrap_or(false);
            let ord = match (av.is_null(), bv.is_null()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => {
                    if nulls_first {
                        std::cmp::Ordering::Less
                    } else {
                        std::cmp::Ordering::Greater
                    }
                }
                (false, true) => {
                    if nulls_first {
                        std::cmp::Ordering::Greater
                    } else {
                        std::cmp::Ordering::Less
                    }
                }
                (false, false) => {
                    let ord = av.total_cmp(&bv);
                    if key.desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Slice by offset and limit.
pub fn limit(rows: &mut Vec<Row>, limit: Option<i64>, offset: i64) {
    let skip = offset.max(0) as usize;
    if skip > 0 {
        if skip >= rows.len() {
            rows.clear();
        } else {
            rows.drain(..skip);
        }
    }
    if let Some(l) = limit {
        rows.truncate(l.max(0) as usize);
    }
}

/// Deduplicate by canonicalized row, or by named columns.
pub fn distinct(rows: &mut Vec<Row>, columns: Option<&[String]>) -> Result<()> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows.drain(..) {
        let key = match columns {
            Some(cols) => row_key_of(&row, cols)?,
            None => row_key(&row)?,
        };
        if seen.insert(key) {
            kept.push(row);
        }
    }
    *rows = kept;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn key(column: &str, desc: bool) -> OrderKey {
        OrderKey { column: column.into(), desc, nulls_first: None }
    }

    #[test]
    fn order_by_is_stable_and_multi_key() {
        let mut rows = vec![
            row(&[("a", Value::Int(1)), ("b", Value::Text("y".into()))]),
            row(&[("a", Value::Int(2)), ("b", Value::Text("x".into()))]),
            row(&[("a", Value::Int(1)), ("b", Value::Text("x".into()))]),
        ];
        order_by(&mut rows, &[key("a", false), key("b", true)]);
        assert_eq!(rows[0].get("b"), Some(&Value::Text("y".into())));
        assert_eq!(rows[1].get("b"), Some(&Value::Text("x".into())));
        assert_eq!(rows[2].get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn nulls_sort_last_by_default_even_desc() {
        let mut rows = vec![
            row(&[("a", Value::Null)]),
            row(&[("a", Value::Int(2))]),
            row(&[("a", Value::Int(1))]),
        ];
        order_by(&mut rows, &[key("a", true)]);
        assert_eq!(rows[0].get("a"), Some(&Value::Int(2)));
        assert_eq!(rows[2].get("a"), Some(&Value::Null));

        let mut rows = vec![
            row(&[("a", Value::Null)]),
            row(&[("a", Value::Int(1))]),
        ];
        order_by(&mut rows, &[OrderKey { column: "a".into(), desc: false, nulls_first: Some(true) }]);
        assert_eq!(rows[0].get("a"), Some(&Value::Null));
    }

    #[test]
    fn limit_slices_with_offset() {
        let mut rows: Vec<Row> = (0..5).map(|i| row(&[("n", Value::Int(i))])).collect();
        limit(&mut rows, Some(2), 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("n"), Some(&Value::Int(1)));

        let mut rows: Vec<Row> = (0..3).map(|i| row(&[("n", Value::Int(i))])).collect();
        limit(&mut rows, None, 10);
        assert!(rows.is_empty());
    }

    #[test]
    fn distinct_by_whole_row_and_by_columns() {
        let mut rows = vec![
            row(&[("a", Value::Int(1)), ("b", Value::Int(1))]),
            row(&[("a", Value::Int(1)), ("b", Value::Int(2))]),
            row(&[("a", Value::Int(1)), ("b", Value::Int(1))]),
        ];
        let mut whole = rows.clone();
        distinct(&mut whole, None).unwrap();
        assert_eq!(whole.len(), 2);

        distinct(&mut rows, Some(&["a".to_string()])).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn project_strips_qualifiers_and_null_fills() {
        let input = ExecOutput::from_rows(vec![row(&[
            ("x", Value::Text("p".into())),
        ])]);
        let cols = vec![
            ProjColumn::Column { name: "a.x".into(), alias: None },
            ProjColumn::Column { name: "b.y".into(), alias: None },
        ];
        let out = project(input, &cols).unwrap();
        assert_eq!(out.columns, vec!["x", "y"]);
        assert_eq!(out.rows[0].get("x"), Some(&Value::Text("p".into())));
        assert_eq!(out.rows[0].get("y"), Some(&Value::Null));
    }
}
