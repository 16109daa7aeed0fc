//! Join step.
//!
//! Matches the current (left) rows against a right table using equality
//! predicates. Unmatched left rows null-fill for LEFT/FULL, unmatched right
//! rows for RIGHT/FULL. The merged row carries all left keys, right keys
//! that do not collide, and `alias.key` qualified forms for every bare key
//! on both sides so downstream filters and projections can reference
//! either spelling.

use quarry_sql::plan::{JoinKind, JoinOn};
use quarry_types::{Result, Row};

use crate::eval::{lookup_opt, values_equal};

use super::ExecOutput;

/// Run a join step.
pub fn join(
    left: ExecOutput,
    left_alias: Option<String>,
    kind: JoinKind,
    right: ExecOutput,
    right_alias: &str,
    on: Option<&[JoinOn]>,
) -> Result<ExecOutput> {
    let left_alias = left_alias.as_deref();
    let cartesian = matches!(kind, JoinKind::Cross) || on.is_none();

    let mut rows = Vec::new();
    let mut right_matched = vec![false; right.rows.len()];

    for lrow in &left.rows {
        let mut matched = false;
        for (ri, rrow) in right.rows.iter().enumerate() {
            let hit = cartesian || on.is_some_and(|preds| matches(lrow, rrow, preds));
            if hit {
                matched = true;
                right_matched[ri] = true;
                rows.push(merge_rows(lrow, left_alias, rrow, right_alias));
            }
        }
        if !matched && matches!(kind, JoinKind::Left | JoinKind::Full) {
            rows.push(merge_rows(lrow, left_alias, &Row::new(), right_alias));
        }
    }

    if matches!(kind, JoinKind::Right | JoinKind::Full) {
        for (ri, rrow) in right.rows.iter().enumerate() {
            if !right_matched[ri] {
                rows.push(merge_rows(&Row::new(), left_alias, rrow, right_alias));
            }
        }
    }

    // Output columns: left's, then right's bare keys that don't collide.
    let mut columns = left.columns.clone();
    for c in &right.columns {
        if !columns.contains(c) {
            columns.push(c.clone());
        }
    }
    Ok(ExecOutput { rows, columns })
}

/// Every predicate must hold. Each side of a predicate is tried against the
/// row it names; if the reference doesn't resolve there, the sides swap.
fn matches(lrow: &Row, rrow: &Row, preds: &[JoinOn]) -> bool {
    preds.iter().all(|p| {
        let straight = lookup_opt(lrow, &p.left).zip(lookup_opt(rrow, &p.right));
        let crossed = || lookup_opt(lrow, &p.right).zip(lookup_opt(rrow, &p.left));
        match straight.or_else(crossed) {
            Some((a, b)) => values_equal(&a, &b),
            None => false,
        }
    })
}

/// Merge a left and right row: all left keys, right keys that do not
/// collide, and `alias.key` forms for every bare key on both sides.
pub fn merge_rows(lrow: &Row, left_alias: Option<&str>, rrow: &Row, right_alias: &str) -> Row {
    let mut out = Row::new();
    for (k, v) in lrow {
        out.insert(k.clone(), v.clone());
        if let Some(alias) = left_alias {
            if !k.contains('.') {
                out.insert(format!("{alias}.{k}"), v.clone());
            }
        }
    }
    for (k, v) in rrow {
        out.entry(k.clone()).or_insert_with(|| v.clone());
        if !k.contains('.') {
            out.insert(format!("{right_alias}.{k}"), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::Value;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn a() -> ExecOutput {
        ExecOutput::from_rows(vec![
            row(&[("id", Value::Int(1)), ("x", Value::Text("p".into()))]),
            row(&[("id", Value::Int(2)), ("x", Value::Text("q".into()))]),
        ])
    }

    fn b() -> ExecOutput {
        ExecOutput::from_rows(vec![row(&[("aid", Value::Int(1)), ("y", Value::Text("r".into()))])])
    }

    fn on() -> Vec<JoinOn> {
        vec![JoinOn { left: "a.id".into(), right: "b.aid".into() }]
    }

    #[test]
    fn inner_join_keeps_matches_only() {
        let out = join(a(), Some("a".into()), JoinKind::Inner, b(), "b", Some(&on())).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].get("y"), Some(&Value::Text("r".into())));
    }

    #[test]
    fn left_join_null_fills_unmatched_left() {
        let out = join(a(), Some("a".into()), JoinKind::Left, b(), "b", Some(&on())).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].get("y"), Some(&Value::Text("r".into())));
        assert!(out.rows[1].get("y").is_none(), "missing key projects as Null downstream");
        assert_eq!(out.rows[1].get("x"), Some(&Value::Text("q".into())));
    }

    #[test]
    fn merged_rows_carry_qualified_forms() {
        let out = join(a(), Some("a".into()), JoinKind::Inner, b(), "b", Some(&on())).unwrap();
        let r = &out.rows[0];
        assert_eq!(r.get("a.id"), Some(&Value::Int(1)));
        assert_eq!(r.get("b.aid"), Some(&Value::Int(1)));
        assert_eq!(r.get("a.x"), Some(&Value::Text("p".into())));
        assert_eq!(r.get("b.y"), Some(&Value::Text("r".into())));
        assert_eq!(r.get("x"), Some(&Value::Text("p".into())));
        assert_eq!(r.get("y"), Some(&Value::Text("r".into())));
    }

    #[test]
    fn right_and_full_fill_the_other_side() {
        let extra_b = ExecOutput::from_rows(vec![
            row(&[("aid", Value::Int(1)), ("y", Value::Text("r".into()))]),
            row(&[("aid", Value::Int(9)), ("y", Value::Text("z".into()))]),
        ]);
        let out = join(a(), Some("a".into()), JoinKind::Right, extra_b.clone(), "b", Some(&on())).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert!(out.rows[1].get("x").is_none());
        assert_eq!(out.rows[1].get("y"), Some(&Value::Text("z".into())));

        let out = join(a(), Some("a".into()), JoinKind::Full, extra_b, "b", Some(&on())).unwrap();
        assert_eq!(out.rows.len(), 3);
    }

    #[test]
    fn cross_join_is_cartesian() {
        let out = join(a(), Some("a".into()), JoinKind::Cross, b(), "b", None).unwrap();
        assert_eq!(out.rows.len(), 2);
    }

    #[test]
    fn swapped_predicate_sides_still_match() {
        let preds = vec![JoinOn { left: "b.aid".into(), right: "a.id".into() }];
        let out = join(a(), Some("a".into()), JoinKind::Inner, b(), "b", Some(&preds)).unwrap();
        assert_eq!(out.rows.len(), 1);
    }
}
