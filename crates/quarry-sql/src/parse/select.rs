//! SELECT parser.
//!
//! Builds the pipeline in canonical order: scan (table/derived/virtual),
//! joins, WHERE filter, aggregate (plus HAVING filter), window, project,
//! distinct, order_by, limit. Set operations recursively parse the right
//! side, compose a `SetOp` step and hoist the trailing order/limit steps to
//! the post-union level.

use quarry_types::{Error, Result};

use crate::plan::{
    AggFunc, AggSpec, Cte, Expr, JoinKind, JoinOn, OrderKey, PlanStep, ProjColumn, QueryPlan,
    SetOpKind, WinFunc, WinSpec,
};
use crate::token::{Token, TokenKind};

use super::cond::parse_condition;
use super::expr::{expr_display, parse_expr};
use super::Cursor;

/// Parse a SELECT token slice into an executable plan.
pub fn parse_select(tokens: &[Token], ctes: Vec<Cte>) -> Result<QueryPlan> {
    let mut c = Cursor::new(tokens);
    let plan = parse_select_at(&mut c, ctes)?;
    c.expect_end()?;
    Ok(plan)
}

fn parse_select_at(c: &mut Cursor<'_>, ctes: Vec<Cte>) -> Result<QueryPlan> {
    c.expect_kw("SELECT")?;
    let distinct = c.eat_kw("DISTINCT");
    c.eat_kw("ALL");

    // Select list
    let mut items = vec![parse_select_item(c)?];
    while c.eat_symbol(",") {
        items.push(parse_select_item(c)?);
    }

    // FROM
    let mut pipeline: Vec<PlanStep> = Vec::new();
    if c.eat_kw("FROM") {
        if c.peek().is_some_and(|t| t.is_symbol("(")) {
            let inner = c.parenthesized()?;
            let alias = parse_alias(c)?.unwrap_or_else(|| "derived".to_string());
            let plan = parse_select(&inner, ctes.clone())?;
            pipeline.push(PlanStep::DerivedScan { plan: Box::new(plan), alias });
        } else {
            let table = c.expect_name()?;
            let alias = parse_alias(c)?;
            pipeline.push(PlanStep::TableScan { table, alias });
        }
    } else {
        pipeline.push(PlanStep::VirtualRow);
    }

    // JOINs
    while let Some(kind) = parse_join_kind(c)? {
        let table = c.expect_name()?;
        let alias = parse_alias(c)?;
        let on = if c.eat_kw("ON") {
            let mut preds = vec![parse_join_pred(c)?];
            while c.eat_kw("AND") {
                preds.push(parse_join_pred(c)?);
            }
            Some(preds)
        } else {
            None
        };
        pipeline.push(PlanStep::Join { kind, table, alias, on });
    }

    // WHERE
    if c.eat_kw("WHERE") {
        let cond = parse_condition(c)?;
        pipeline.push(PlanStep::Filter { cond });
    }

    // GROUP BY
    let mut group_by = Vec::new();
    if c.eat_kw("GROUP") {
        c.expect_kw("BY")?;
        loop {
            group_by.push(c.expect_column_ref()?);
            if !c.eat_symbol(",") {
                break;
            }
        }
    }

    // HAVING
    let having = if c.eat_kw("HAVING") {
        Some(parse_condition(c)?)
    } else {
        None
    };

    // Aggregate step
    let has_aggregate = !group_by.is_empty() || items.iter().any(|i| matches!(i.kind, ItemKind::Agg { .. }));
    if has_aggregate {
        let aggs = items
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Agg { func, arg, distinct, display, separator } => Some(AggSpec {
                    func: *func,
                    arg: arg.clone(),
                    distinct: *distinct,
                    alias: item.alias.clone().unwrap_or_else(|| display.clone()),
                    display: display.clone(),
                    separator: separator.clone(),
                }),
                _ => None,
            })
            .collect();
        pipeline.push(PlanStep::Aggregate { group_by, aggs });
        if let Some(cond) = having {
            pipeline.push(PlanStep::Filter { cond });
        }
    } else if having.is_some() {
        return Err(Error::Parse("HAVING requires GROUP BY or aggregates".into()));
    }

    // Window step
    let wins: Vec<WinSpec> = items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Win { func, arg, partition_by, order_by, display } => Some(WinSpec {
                func: *func,
                arg: arg.clone(),
                partition_by: partition_by.clone(),
                order_by: order_by.clone(),
                alias: item.alias.clone().unwrap_or_else(|| display.clone()),
            }),
            _ => None,
        })
        .collect();
    if !wins.is_empty() {
        pipeline.push(PlanStep::Window { funcs: wins });
    }

    // Project step
    let columns = items
        .iter()
        .map(|item| match &item.kind {
            ItemKind::Star => ProjColumn::Star,
            ItemKind::Column(name) => ProjColumn::Column { name: name.clone(), alias: item.alias.clone() },
            ItemKind::Agg { display, .. } | ItemKind::Win { display, .. } => ProjColumn::Column {
                name: item.alias.clone().unwrap_or_else(|| display.clone()),
                alias: None,
            },
            ItemKind::Expr(e) => ProjColumn::Expr {
                expr: e.clone(),
                alias: item.alias.clone().unwrap_or_else(|| expr_display(e)),
            },
        })
        .collect();
    pipeline.push(PlanStep::Project { columns });

    if distinct {
        pipeline.push(PlanStep::Distinct { columns: None });
    }

    // Set operation: the right side owns the remaining tokens; trailing
    // order/limit steps are hoisted back out to the post-union level.
    if let Some(op) = parse_set_op_kind(c) {
        let all = c.eat_kw("ALL");
        let right_tokens: Vec<Token> = c.rest().to_vec();
        c.set_pos(c.pos() + right_tokens.len());
        let mut right = parse_select(&right_tokens, ctes.clone())?;
        let mut hoisted = Vec::new();
        while matches!(right.pipeline.last(), Some(PlanStep::OrderBy { .. }) | Some(PlanStep::Limit { .. })) {
            hoisted.push(right.pipeline.pop().expect("non-empty pipeline"));
        }
        hoisted.reverse();
        pipeline.push(PlanStep::SetOp { op, all, right: Box::new(right) });
        // Hoisted order keys reference the left select list.
        for step in hoisted {
            pipeline.push(resolve_hoisted(step, &items)?);
        }
        return Ok(QueryPlan { pipeline, ctes });
    }

    // ORDER BY
    if c.eat_kw("ORDER") {
        c.expect_kw("BY")?;
        let keys = parse_order_keys(c, Some(&items))?;
        pipeline.push(PlanStep::OrderBy { keys });
    }

    // LIMIT [OFFSET]
    if c.eat_kw("LIMIT") {
        let limit = expect_int(c)?;
        let offset = if c.eat_kw("OFFSET") { expect_int(c)? } else { 0 };
        pipeline.push(PlanStep::Limit { limit: Some(limit), offset });
    }

    Ok(QueryPlan { pipeline, ctes })
}

fn resolve_hoisted(step: PlanStep, items: &[SelectItem]) -> Result<PlanStep> {
    match step {
        PlanStep::OrderBy { keys } => {
            let keys = keys
                .into_iter()
                .map(|k| {
                    // Positions were resolved against the right select list;
                    // re-resolving against the left is a no-op for names.
                    Ok(OrderKey { column: resolve_position(&k.column, items)?, ..k })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(PlanStep::OrderBy { keys })
        }
        other => Ok(other),
    }
}

fn resolve_position(column: &str, items: &[SelectItem]) -> Result<String> {
    match column.parse::<usize>() {
        Ok(n) if n >= 1 && n <= items.len() => Ok(item_output_name(&items[n - 1])),
        Ok(n) => Err(Error::Parse(format!("ORDER BY position {n} out of range"))),
        Err(_) => Ok(column.to_string()),
    }
}

//─────────────────────────────
//  Select items
//─────────────────────────────

#[derive(Debug, Clone)]
enum ItemKind {
    Star,
    Column(String),
    Agg {
        func: AggFunc,
        arg: Option<Expr>,
        distinct: bool,
        display: String,
        separator: Option<String>,
    },
    Win {
        func: WinFunc,
        arg: Option<Expr>,
        partition_by: Vec<String>,
        order_by: Vec<OrderKey>,
        display: String,
    },
    Expr(Expr),
}

#[derive(Debug, Clone)]
struct SelectItem {
    kind: ItemKind,
    alias: Option<String>,
}

fn item_output_name(item: &SelectItem) -> String {
    if let Some(alias) = &item.alias {
        return alias.clone();
    }
    match &item.kind {
        ItemKind::Star => "*".to_string(),
        ItemKind::Column(name) => name.rsplit('.').next().unwrap_or(name).to_string(),
        ItemKind::Agg { display, .. } | ItemKind::Win { display, .. } => display.clone(),
        ItemKind::Expr(e) => expr_display(e),
    }
}

fn parse_select_item(c: &mut Cursor<'_>) -> Result<SelectItem> {
    if c.eat_symbol("*") {
        return Ok(SelectItem { kind: ItemKind::Star, alias: None });
    }

    // Aggregate / window call?
    let kind = if let Some(kind) = try_parse_fn_item(c)? {
        kind
    } else {
        match parse_expr(c)? {
            Expr::Column(name) => ItemKind::Column(name),
            e => ItemKind::Expr(e),
        }
    };

    let alias = parse_alias(c)?;
    Ok(SelectItem { kind, alias })
}

/// Recognize `FN(args) [OVER (…)]` for the aggregate and window function
/// names; anything else falls back to the generic expression parser.
fn try_parse_fn_item(c: &mut Cursor<'_>) -> Result<Option<ItemKind>> {
    let (name, is_call) = match (c.peek(), c.peek_at(1)) {
        (Some(t), Some(p))
            if matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword) && p.is_symbol("(") =>
        {
            (t.text.to_ascii_uppercase(), true)
        }
        _ => (String::new(), false),
    };
    if !is_call {
        return Ok(None);
    }
    let is_ranked = matches!(name.as_str(), "ROW_NUMBER" | "RANK" | "DENSE_RANK");
    if AggFunc::from_name(&name).is_none() && !is_ranked {
        return Ok(None);
    }

    c.advance();
    c.expect_symbol("(")?;

    let mut distinct = false;
    let mut arg: Option<Expr> = None;
    let mut separator: Option<String> = None;
    let mut display_arg = String::new();

    if is_ranked {
        c.expect_symbol(")")?;
    } else if c.eat_symbol("*") {
        c.expect_symbol(")")?;
        display_arg.push('*');
    } else {
        distinct = c.eat_kw("DISTINCT");
        let e = parse_expr(c)?;
        display_arg = if distinct {
            format!("DISTINCT {}", expr_display(&e))
        } else {
            expr_display(&e)
        };
        arg = Some(e);
        if name == "GROUP_CONCAT" && c.eat_kw("SEPARATOR") {
            match c.advance() {
                Some(t) if t.kind == TokenKind::Str => separator = Some(t.text.clone()),
                _ => return Err(c.unexpected("expected a separator string")),
            }
        }
        c.expect_symbol(")")?;
    }
    let display = format!("{name}({display_arg})");

    if c.eat_kw("OVER") {
        let func = WinFunc::from_name(&name)
            .ok_or_else(|| Error::Parse(format!("{name} cannot be used as a window function")))?;
        c.expect_symbol("(")?;
        let mut partition_by = Vec::new();
        if c.eat_kw("PARTITION") {
            c.expect_kw("BY")?;
            loop {
                partition_by.push(c.expect_column_ref()?);
                if !c.eat_symbol(",") {
                    break;
                }
            }
        }
        let order_by = if c.eat_kw("ORDER") {
            c.expect_kw("BY")?;
            parse_order_keys(c, None)?
        } else {
            Vec::new()
        };
        c.expect_symbol(")")?;
        let display = format!("{display} OVER");
        return Ok(Some(ItemKind::Win { func, arg, partition_by, order_by, display }));
    }

    let func = AggFunc::from_name(&name)
        .ok_or_else(|| Error::Parse(format!("{name} requires an OVER clause")))?;
    Ok(Some(ItemKind::Agg { func, arg, distinct, display, separator }))
}

//─────────────────────────────
//  Clause helpers
//─────────────────────────────

/// `[AS] alias`; a bare identifier counts, a keyword does not.
fn parse_alias(c: &mut Cursor<'_>) -> Result<Option<String>> {
    if c.eat_kw("AS") {
        return Ok(Some(c.expect_name()?));
    }
    match c.peek() {
        Some(t) if t.kind == TokenKind::Identifier => {
            let name = t.text.clone();
            c.advance();
            Ok(Some(name))
        }
        _ => Ok(None),
    }
}

fn parse_join_kind(c: &mut Cursor<'_>) -> Result<Option<JoinKind>> {
    let kind = match c.peek() {
        Some(t) if t.is_kw("JOIN") || t.is_kw("INNER") => JoinKind::Inner,
        Some(t) if t.is_kw("LEFT") => JoinKind::Left,
        Some(t) if t.is_kw("RIGHT") => JoinKind::Right,
        Some(t) if t.is_kw("FULL") => JoinKind::Full,
        Some(t) if t.is_kw("CROSS") => JoinKind::Cross,
        _ => return Ok(None),
    };
    if !c.eat_kw("JOIN") {
        c.advance();
        c.eat_kw("OUTER");
        c.expect_kw("JOIN")?;
    }
    Ok(Some(kind))
}

fn parse_join_pred(c: &mut Cursor<'_>) -> Result<JoinOn> {
    let left = c.expect_column_ref()?;
    if !c.eat_op("=") {
        return Err(c.unexpected("expected '=' in join condition"));
    }
    let right = c.expect_column_ref()?;
    Ok(JoinOn { left, right })
}

fn parse_order_keys(c: &mut Cursor<'_>, items: Option<&[SelectItem]>) -> Result<Vec<OrderKey>> {
    let mut keys = Vec::new();
    loop {
        let column = match c.peek() {
            Some(t) if t.kind == TokenKind::Number => {
                let text = t.text.clone();
                c.advance();
                match items {
                    Some(items) => resolve_position(&text, items)?,
                    None => text,
                }
            }
            _ => c.expect_column_ref()?,
        };
        let desc = if c.eat_kw("DESC") {
            true
        } else {
            c.eat_kw("ASC");
            false
        };
        let nulls_first = if c.eat_kw("NULLS") {
            if c.eat_kw("FIRST") {
                Some(true)
            } else {
                c.expect_kw("LAST")?;
                Some(false)
            }
        } else {
            None
        };
        keys.push(OrderKey { column, desc, nulls_first });
        if !c.eat_symbol(",") {
            break;
        }
    }
    Ok(keys)
}

fn parse_set_op_kind(c: &mut Cursor<'_>) -> Option<SetOpKind> {
    let op = match c.peek() {
        Some(t) if t.is_kw("UNION") => SetOpKind::Union,
        Some(t) if t.is_kw("EXCEPT") => SetOpKind::Except,
        Some(t) if t.is_kw("INTERSECT") => SetOpKind::Intersect,
        _ => return None,
    };
    c.advance();
    Some(op)
}

fn expect_int(c: &mut Cursor<'_>) -> Result<i64> {
    match c.advance() {
        Some(t) if t.kind == TokenKind::Number && !t.text.contains('.') => t
            .text
            .parse::<i64>()
            .map_err(|_| Error::Parse(format!("bad integer '{}'", t.text))),
        Some(t) => Err(Error::Parse(format!("expected an integer, found '{}'", t.text))),
        None => Err(Error::Parse("expected an integer".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn plan(sql: &str) -> QueryPlan {
        parse_select(&tokenize(sql).unwrap(), Vec::new()).unwrap()
    }

    fn step_names(p: &QueryPlan) -> Vec<&'static str> {
        p.pipeline
            .iter()
            .map(|s| match s {
                PlanStep::VirtualRow => "virtual_row",
                PlanStep::TableScan { .. } => "table_scan",
                PlanStep::DerivedScan { .. } => "derived_scan",
                PlanStep::IndexScan { .. } => "index_scan",
                PlanStep::Filter { .. } => "filter",
                PlanStep::Project { .. } => "project",
                PlanStep::OrderBy { .. } => "order_by",
                PlanStep::Limit { .. } => "limit",
                PlanStep::Distinct { .. } => "distinct",
                PlanStep::Aggregate { .. } => "aggregate",
                PlanStep::Window { .. } => "window",
                PlanStep::Join { .. } => "join",
                PlanStep::SetOp { .. } => "union",
            })
            .collect()
    }

    #[test]
    fn canonical_step_order() {
        let p = plan("SELECT name, age FROM users WHERE age > 25 ORDER BY name LIMIT 10 OFFSET 2");
        assert_eq!(step_names(&p), vec!["table_scan", "filter", "project", "order_by", "limit"]);
        assert!(matches!(p.pipeline[4], PlanStep::Limit { limit: Some(10), offset: 2 }));
    }

    #[test]
    fn select_without_from_scans_a_virtual_row() {
        let p = plan("SELECT 1 + 2 AS three");
        assert_eq!(step_names(&p), vec!["virtual_row", "project"]);
    }

    #[test]
    fn aggregates_build_aggregate_then_having_filter() {
        let p = plan(
            "SELECT region, SUM(amount) AS total FROM sales GROUP BY region HAVING SUM(amount) > 10 ORDER BY region",
        );
        assert_eq!(
            step_names(&p),
            vec!["table_scan", "aggregate", "filter", "project", "order_by"]
        );
        match &p.pipeline[1] {
            PlanStep::Aggregate { group_by, aggs } => {
                assert_eq!(group_by, &vec!["region".to_string()]);
                assert_eq!(aggs.len(), 1);
                assert_eq!(aggs[0].alias, "total");
                assert_eq!(aggs[0].display, "SUM(amount)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn join_with_on_predicates() {
        let p = plan("SELECT a.x, b.y FROM a LEFT JOIN b ON a.id = b.aid ORDER BY a.id");
        match &p.pipeline[1] {
            PlanStep::Join { kind: JoinKind::Left, table, on, .. } => {
                assert_eq!(table, "b");
                let on = on.as_ref().unwrap();
                assert_eq!(on[0].left, "a.id");
                assert_eq!(on[0].right, "b.aid");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn union_hoists_trailing_order_and_limit() {
        let p = plan("SELECT a FROM t UNION SELECT a FROM u ORDER BY a LIMIT 3");
        let names = step_names(&p);
        assert_eq!(names, vec!["table_scan", "project", "union", "order_by", "limit"]);
        match &p.pipeline[2] {
            PlanStep::SetOp { op: SetOpKind::Union, all: false, right } => {
                assert_eq!(step_names(right), vec!["table_scan", "project"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn order_by_position_resolves_to_select_column() {
        let p = plan("SELECT name, age FROM users ORDER BY 2 DESC");
        match p.pipeline.last().unwrap() {
            PlanStep::OrderBy { keys } => {
                assert_eq!(keys[0].column, "age");
                assert!(keys[0].desc);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn window_function_builds_window_step() {
        let p = plan("SELECT name, ROW_NUMBER() OVER (PARTITION BY dept ORDER BY salary DESC) AS rn FROM emp");
        assert_eq!(step_names(&p), vec!["table_scan", "window", "project"]);
        match &p.pipeline[1] {
            PlanStep::Window { funcs } => {
                assert_eq!(funcs[0].alias, "rn");
                assert_eq!(funcs[0].partition_by, vec!["dept".to_string()]);
                assert!(funcs[0].order_by[0].desc);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn derived_table_parses_recursively() {
        let p = plan("SELECT x FROM (SELECT id AS x FROM t) d WHERE x > 1");
        match &p.pipeline[0] {
            PlanStep::DerivedScan { alias, plan } => {
                assert_eq!(alias, "d");
                assert!(matches!(plan.pipeline[0], PlanStep::TableScan { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn distinct_and_count_distinct() {
        let p = plan("SELECT DISTINCT city FROM users");
        assert_eq!(step_names(&p), vec!["table_scan", "project", "distinct"]);

        let p = plan("SELECT COUNT(DISTINCT city) FROM users");
        match &p.pipeline[1] {
            PlanStep::Aggregate { aggs, .. } => {
                assert!(aggs[0].distinct);
                assert_eq!(aggs[0].display, "COUNT(DISTINCT city)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn group_concat_separator() {
        let p = plan("SELECT GROUP_CONCAT(name SEPARATOR '; ') FROM t");
        match &p.pipeline[1] {
            PlanStep::Aggregate { aggs, .. } => {
                assert_eq!(aggs[0].separator.as_deref(), Some("; "));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
