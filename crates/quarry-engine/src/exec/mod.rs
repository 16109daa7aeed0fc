//! Query pipeline executor.
//!
//! Walks a plan's steps linearly, maintaining the current row sequence, the
//! output column order and the current left-table alias used to qualify
//! join output. Subqueries are pre-evaluated against the resolved state
//! (the owning condition tree is copied, never mutated in place), CTEs
//! execute through an overlay of virtual tables, and the recursive-CTE
//! fixpoint iterates a frontier until it dries up or hits the iteration
//! cap.

mod agg;
mod join;
mod ops;
mod window;

use std::collections::{HashMap, HashSet};

use tracing::trace;

use quarry_sql::parse::parse_select;
use quarry_sql::plan::{
    CaseBranch, CmpOp, Condition, Cte, Expr, IndexOp, PlanStep, QueryPlan, ResolvedSubquery,
    SetOpKind, Subquery,
};
use quarry_sql::{tables_in_tokens, Token};
use quarry_stream::{ReadSet, ResolvedState};
use quarry_types::{from_value, value_to_row, Error, IndexDef, Result, Row, Value};

use crate::eval::{compare, eval_condition, lookup, row_key};
use crate::paths;

/// Recursive CTE iteration cap.
const MAX_CTE_ITERATIONS: usize = 1000;

/// Subquery/derived nesting cap, a runaway-recursion backstop.
const MAX_NESTING: usize = 32;

//─────────────────────────────
//  Output
//─────────────────────────────

/// A row sequence plus its output column order.
///
/// Rows are keyed mappings, so the select-list order has to travel
/// alongside them for scalar-subquery resolution ("first column") and
/// positional CTE normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    /// Result rows in order.
    pub rows: Vec<Row>,
    /// Output column order; empty when unknown (raw scans).
    pub columns: Vec<String>,
}

impl ExecOutput {
    fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.keys().filter(|k| !k.contains('.')).cloned().collect())
            .unwrap_or_default();
        Self { rows, columns }
    }

    /// Value in "first column" position of a row.
    fn first_column(&self, row: &Row) -> Value {
        match self.columns.first() {
            Some(c) => lookup(row, c),
            None => row.values().next().cloned().unwrap_or(Value::Null),
        }
    }
}

//─────────────────────────────
//  ReadSet construction
//─────────────────────────────

/// Build the read set a plan needs: row and index prefixes for every
/// scanned or joined table, recursing into derived plans, set-op right
/// sides, CTE bodies and subquery token slices.
pub fn plan_read_set(plan: &QueryPlan) -> ReadSet {
    let mut rs = ReadSet::new();
    let cte_names: HashSet<String> = plan.ctes.iter().map(|c| c.name.clone()).collect();
    for cte in &plan.ctes {
        add_token_tables(&cte.tokens, &cte_names, &mut rs);
    }
    collect_steps(&plan.pipeline, &cte_names, &mut rs);
    rs.refs.sort();
    rs.refs.dedup();
    rs.prefixes.sort();
    rs.prefixes.dedup();
    rs
}

fn add_table(table: &str, rs: &mut ReadSet) {
    rs.prefixes.push(paths::rows_prefix(table));
    rs.prefixes.push(paths::indexes_prefix(table));
}

fn add_token_tables(tokens: &[Token], cte_names: &HashSet<String>, rs: &mut ReadSet) {
    for table in tables_in_tokens(tokens) {
        if !cte_names.contains(&table) {
            add_table(&table, rs);
        }
    }
}

fn collect_steps(steps: &[PlanStep], cte_names: &HashSet<String>, rs: &mut ReadSet) {
    for step in steps {
        match step {
            PlanStep::TableScan { table, .. } | PlanStep::Join { table, .. } => {
                if !cte_names.contains(table) {
                    add_table(table, rs);
                }
            }
            PlanStep::IndexScan { table, .. } => add_table(table, rs),
            PlanStep::DerivedScan { plan, .. } | PlanStep::SetOp { right: plan, .. } => {
                rs.merge(plan_read_set(plan));
            }
            PlanStep::Filter { cond } => {
                let mut subs = Vec::new();
                cond_subqueries(cond, &mut subs);
                for sq in subs {
                    add_token_tables(&sq.tokens, cte_names, rs);
                }
            }
            PlanStep::Project { columns } => {
                for col in columns {
                    if let quarry_sql::plan::ProjColumn::Expr { expr, .. } = col {
                        let mut subs = Vec::new();
                        expr_subqueries(expr, &mut subs);
                        for sq in subs {
                            add_token_tables(&sq.tokens, cte_names, rs);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn cond_subqueries<'a>(cond: &'a Condition, out: &mut Vec<&'a Subquery>) {
    match cond {
        Condition::And(parts) | Condition::Or(parts) => {
            for p in parts {
                cond_subqueries(p, out);
            }
        }
        Condition::Not(inner) => cond_subqueries(inner, out),
        Condition::Simple { .. } => {}
        Condition::Cmp { left, right, .. } => {
            expr_subqueries(left, out);
            expr_subqueries(right, out);
        }
        Condition::IsNull { expr, .. } => expr_subqueries(expr, out),
        Condition::InList { expr, items, .. } => {
            expr_subqueries(expr, out);
            for item in items {
                expr_subqueries(item, out);
            }
        }
        Condition::InSubquery { expr, subquery, .. } => {
            expr_subqueries(expr, out);
            out.push(subquery);
        }
        Condition::Like { expr, pattern, .. } => {
            expr_subqueries(expr, out);
            expr_subqueries(pattern, out);
        }
        Condition::Exists { subquery, .. } => out.push(subquery),
    }
}

fn expr_subqueries<'a>(expr: &'a Expr, out: &mut Vec<&'a Subquery>) {
    match expr {
        Expr::Subquery(sq) => out.push(sq),
        Expr::Binary { left, right, .. } => {
            expr_subqueries(left, out);
            expr_subqueries(right, out);
        }
        Expr::Neg(inner) | Expr::Cast { expr: inner, .. } => expr_subqueries(inner, out),
        Expr::Call { args, .. } => {
            for a in args {
                expr_subqueries(a, out);
            }
        }
        Expr::Case { branches, otherwise } => {
            for b in branches {
                cond_subqueries(&b.when, out);
                expr_subqueries(&b.then, out);
            }
            if let Some(e) = otherwise {
                expr_subqueries(e, out);
            }
        }
        Expr::Literal(_) | Expr::Column(_) => {}
    }
}

//─────────────────────────────
//  Execution context
//─────────────────────────────

/// Per-execution state: the resolved persistence snapshot, the CTEs in
/// scope and the overlay of virtual tables (CTE results, recursion
/// frontiers).
pub struct ExecCtx<'a> {
    state: &'a ResolvedState,
    ctes: Vec<Cte>,
    overlay: HashMap<String, ExecOutput>,
    depth: usize,
}

impl<'a> ExecCtx<'a> {
    fn new(state: &'a ResolvedState, ctes: Vec<Cte>) -> Self {
        Self { state, ctes, overlay: HashMap::new(), depth: 0 }
    }

    fn is_virtual(&self, table: &str) -> bool {
        self.overlay.contains_key(table) || self.ctes.iter().any(|c| c.name == table)
    }

    /// Rows of a table: overlay first, then CTEs, then resolved state.
    fn scan_table(&mut self, table: &str) -> Result<ExecOutput> {
        if let Some(out) = self.overlay.get(table) {
            return Ok(out.clone());
        }
        if let Some(cte) = self.ctes.iter().find(|c| c.name == table).cloned() {
            return self.execute_cte(&cte);
        }
        let prefix = paths::rows_prefix(table);
        let Some(mapping) = self.state.prefixes.get(&prefix) else {
            return Ok(ExecOutput::default());
        };
        let mut rows: Vec<Row> = Vec::with_capacity(mapping.len());
        for value in mapping.values() {
            rows.push(value_to_row(value)?);
        }
        // Ref order is lexicographic; present rows in id order.
        rows.sort_by_key(|r| r.get("id").and_then(Value::as_int).unwrap_or(i64::MAX));
        Ok(ExecOutput::from_rows(rows))
    }

    /// First index on `column` for `table`, by index name order.
    fn find_index(&self, table: &str, column: &str) -> Option<(String, IndexDef)> {
        let bare = column.rsplit('.').next().unwrap_or(column);
        let mapping = self.state.prefixes.get(&paths::indexes_prefix(table))?;
        for (name, value) in mapping {
            if let Ok(def) = from_value::<IndexDef>(value) {
                if def.column == bare {
                    let short = paths::name_from_index_ref(name).unwrap_or(name).to_string();
                    return Some((short, def));
                }
            }
        }
        None
    }

    fn index_def(&self, table: &str, index: &str) -> Result<IndexDef> {
        let mapping = self
            .state
            .prefixes
            .get(&paths::indexes_prefix(table))
            .ok_or_else(|| Error::Resolution(format!("indexes of '{table}' were not declared")))?;
        let name = paths::index_ref(table, index);
        let value = mapping
            .get(&name)
            .ok_or_else(|| Error::Schema(format!("no such index '{index}' on '{table}'")))?;
        from_value(value)
    }

    //─────────────────────────────
    //  CTE execution
    //─────────────────────────────

    fn execute_cte(&mut self, cte: &Cte) -> Result<ExecOutput> {
        if cte.recursive {
            return self.execute_recursive_cte(cte);
        }
        let plan = parse_select(&cte.tokens, self.ctes_without(&cte.name))?;
        let out = normalize(self.run_subplan(&plan)?, &cte.columns);
        // Memoize: repeated scans of the same CTE see one evaluation.
        self.overlay.insert(cte.name.clone(), out.clone());
        Ok(out)
    }

    /// Fixpoint: evaluate the base case, then re-evaluate the recursive
    /// case against the current frontier until no new rows appear.
    fn execute_recursive_cte(&mut self, cte: &Cte) -> Result<ExecOutput> {
        let (left, right, all) = split_recursive_body(&cte.tokens)?;
        let scoped = self.ctes_without(&cte.name);
        let base_plan = parse_select(&left, scoped.clone())?;
        let step_plan = parse_select(&right, scoped)?;

        let base = normalize(self.run_subplan(&base_plan)?, &cte.columns);
        let columns = base.columns.clone();
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        if !all {
            for row in &base.rows {
                seen.insert(row_key(row)?);
            }
        }
        let mut result = base.rows.clone();
        let mut frontier = base;

        for iteration in 0..MAX_CTE_ITERATIONS {
            self.overlay.insert(cte.name.clone(), frontier);
            let produced = normalize(self.run_subplan(&step_plan)?, &cte.columns);
            self.overlay.remove(&cte.name);

            let mut fresh = Vec::new();
            for row in produced.rows {
                if all || seen.insert(row_key(&row)?) {
                    fresh.push(row);
                }
            }
            trace!(cte = %cte.name, iteration, produced = fresh.len(), "recursive cte step");
            if fresh.is_empty() {
                break;
            }
            result.extend(fresh.iter().cloned());
            frontier = ExecOutput { rows: fresh, columns: columns.clone() };
        }

        Ok(ExecOutput { rows: result, columns })
    }

    fn ctes_without(&self, name: &str) -> Vec<Cte> {
        self.ctes.iter().filter(|c| c.name != name).cloned().collect()
    }

    fn run_subplan(&mut self, plan: &QueryPlan) -> Result<ExecOutput> {
        if self.depth >= MAX_NESTING {
            return Err(Error::Runtime("query nesting too deep".into()));
        }
        self.depth += 1;
        let saved = if plan.ctes.is_empty() {
            None
        } else {
            Some(std::mem::replace(&mut self.ctes, plan.ctes.clone()))
        };
        let out = run_pipeline(&plan.pipeline, self);
        if let Some(ctes) = saved {
            self.ctes = ctes;
        }
        self.depth -= 1;
        out
    }
}

/// Locate the top-level `UNION [ALL]` of a recursive CTE body.
fn split_recursive_body(tokens: &[Token]) -> Result<(Vec<Token>, Vec<Token>, bool)> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate() {
        if t.is_symbol("(") {
            depth += 1;
        } else if t.is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_kw("UNION") {
            let all = tokens.get(i + 1).is_some_and(|t| t.is_kw("ALL"));
            let rest_start = if all { i + 2 } else { i + 1 };
            return Ok((tokens[..i].to_vec(), tokens[rest_start..].to_vec(), all));
        }
    }
    Err(Error::Parse("recursive CTE requires a top-level UNION".into()))
}

/// Rename output columns positionally onto a CTE's declared names.
fn normalize(out: ExecOutput, declared: &[String]) -> ExecOutput {
    if declared.is_empty() {
        return out;
    }
    let source = out.columns.clone();
    let rows = out
        .rows
        .into_iter()
        .map(|row| {
            declared
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let v = source
                        .get(i)
                        .map(|c| lookup(&row, c))
                        .unwrap_or(Value::Null);
                    (name.clone(), v)
                })
                .collect()
        })
        .collect();
    ExecOutput { rows, columns: declared.to_vec() }
}

//─────────────────────────────
//  Pipeline execution
//─────────────────────────────

/// Execute a plan against resolved state.
pub fn run_plan(plan: &QueryPlan, state: &ResolvedState) -> Result<ExecOutput> {
    let mut ctx = ExecCtx::new(state, plan.ctes.clone());
    run_pipeline(&plan.pipeline, &mut ctx)
}

fn run_pipeline(steps: &[PlanStep], ctx: &mut ExecCtx<'_>) -> Result<ExecOutput> {
    let mut out = ExecOutput::default();
    let mut left_alias: Option<String> = None;
    let mut i = 0;
    while i < steps.len() {
        match &steps[i] {
            PlanStep::VirtualRow => {
                out = ExecOutput { rows: vec![Row::new()], columns: Vec::new() };
            }
            PlanStep::TableScan { table, alias } => {
                left_alias = Some(alias.clone().unwrap_or_else(|| table.clone()));
                // Structural rewrite: a scan immediately filtered by a
                // simple comparison on an indexed column runs off the index.
                if let Some(PlanStep::Filter { cond: Condition::Simple { column, op, value } }) =
                    steps.get(i + 1)
                {
                    if !ctx.is_virtual(table) {
                        if let Some(index_op) = cmp_to_index_op(*op) {
                            if let Some((name, def)) = ctx.find_index(table, column) {
                                trace!(table, index = %name, "table scan rewritten to index scan");
                                out = index_scan(ctx, table, &def, index_op, value, None)?;
                                i += 2;
                                continue;
                            }
                        }
                    }
                }
                out = ctx.scan_table(table)?;
            }
            PlanStep::DerivedScan { plan, alias } => {
                left_alias = Some(alias.clone());
                out = ctx.run_subplan(plan)?;
            }
            PlanStep::IndexScan { table, index, op, key, high } => {
                left_alias = Some(table.clone());
                let def = ctx.index_def(table, index)?;
                out = index_scan(ctx, table, &def, *op, key, high.as_ref())?;
            }
            PlanStep::Filter { cond } => {
                let resolved = resolve_condition(cond, ctx)?;
                let mut kept = Vec::with_capacity(out.rows.len());
                for row in out.rows {
                    if eval_condition(&resolved, &row)? {
                        kept.push(row);
                    }
                }
                out.rows = kept;
            }
            PlanStep::Project { columns } => {
                let columns = resolve_proj_columns(columns, ctx)?;
                out = ops::project(out, &columns)?;
            }
            PlanStep::OrderBy { keys } => ops::order_by(&mut out.rows, keys),
            PlanStep::Limit { limit, offset } => ops::limit(&mut out.rows, *limit, *offset),
            PlanStep::Distinct { columns } => ops::distinct(&mut out.rows, columns.as_deref())?,
            PlanStep::Aggregate { group_by, aggs } => out = agg::aggregate(out, group_by, aggs)?,
            PlanStep::Window { funcs } => window::apply(&mut out, funcs)?,
            PlanStep::Join { kind, table, alias, on } => {
                let right = ctx.scan_table(table)?;
                let right_alias = alias.clone().unwrap_or_else(|| table.clone());
                out = join::join(out, left_alias.take(), *kind, right, &right_alias, on.as_deref())?;
            }
            PlanStep::SetOp { op, all, right } => {
                let right_out = ctx.run_subplan(right)?;
                out = set_op(out, right_out, *op, *all)?;
            }
        }
        i += 1;
    }
    Ok(out)
}

fn cmp_to_index_op(op: CmpOp) -> Option<IndexOp> {
    match op {
        CmpOp::Eq => Some(IndexOp::Eq),
        CmpOp::Neq => Some(IndexOp::Neq),
        CmpOp::Lt => Some(IndexOp::Lt),
        CmpOp::Gt => Some(IndexOp::Gt),
        CmpOp::Lte => Some(IndexOp::Lte),
        CmpOp::Gte => Some(IndexOp::Gte),
    }
}

/// Filter index entries by the comparison, union the matching row ids,
/// project to rows.
fn index_scan(
    ctx: &mut ExecCtx<'_>,
    table: &str,
    def: &IndexDef,
    op: IndexOp,
    key: &Value,
    high: Option<&Value>,
) -> Result<ExecOutput> {
    let mut ids: Vec<i64> = Vec::new();
    for entry in &def.entries {
        let keep = match op {
            IndexOp::Eq => compare(CmpOp::Eq, &entry.key, key),
            IndexOp::Neq => compare(CmpOp::Neq, &entry.key, key),
            IndexOp::Lt => compare(CmpOp::Lt, &entry.key, key),
            IndexOp::Gt => compare(CmpOp::Gt, &entry.key, key),
            IndexOp::Lte => compare(CmpOp::Lte, &entry.key, key),
            IndexOp::Gte => compare(CmpOp::Gte, &entry.key, key),
            IndexOp::Range => {
                compare(CmpOp::Gte, &entry.key, key)
                    && high.map(|h| compare(CmpOp::Lte, &entry.key, h)).unwrap_or(true)
            }
        };
        if keep {
            for id in &entry.row_ids {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
    }
    let table_rows = ctx.scan_table(table)?;
    let by_id: HashMap<i64, &Row> = table_rows
        .rows
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_int).map(|id| (id, r)))
        .collect();
    let rows = ids.into_iter().filter_map(|id| by_id.get(&id).map(|r| (*r).clone())).collect();
    Ok(ExecOutput { rows, columns: table_rows.columns.clone() })
}

//─────────────────────────────
//  Subquery resolution
//─────────────────────────────

/// Produce a copy of a condition tree with every subquery pre-evaluated:
/// EXISTS to a boolean, `IN (subquery)` to a value list, scalar position to
/// its first-column-of-first-row value.
pub fn resolve_condition(cond: &Condition, ctx: &mut ExecCtx<'_>) -> Result<Condition> {
    Ok(match cond {
        Condition::And(parts) => Condition::And(
            parts.iter().map(|p| resolve_condition(p, ctx)).collect::<Result<_>>()?,
        ),
        Condition::Or(parts) => Condition::Or(
            parts.iter().map(|p| resolve_condition(p, ctx)).collect::<Result<_>>()?,
        ),
        Condition::Not(inner) => Condition::Not(Box::new(resolve_condition(inner, ctx)?)),
        Condition::Simple { .. } => cond.clone(),
        Condition::Cmp { left, op, right } => Condition::Cmp {
            left: resolve_expr(left, ctx)?,
            op: *op,
            right: resolve_expr(right, ctx)?,
        },
        Condition::IsNull { expr, negated } => Condition::IsNull {
            expr: resolve_expr(expr, ctx)?,
            negated: *negated,
        },
        Condition::InList { expr, items, negated } => Condition::InList {
            expr: resolve_expr(expr, ctx)?,
            items: items.iter().map(|e| resolve_expr(e, ctx)).collect::<Result<_>>()?,
            negated: *negated,
        },
        Condition::InSubquery { expr, subquery, negated } => {
            let out = exec_subquery(&subquery.tokens, ctx)?;
            let values = out.rows.iter().map(|r| out.first_column(r)).collect();
            Condition::InSubquery {
                expr: resolve_expr(expr, ctx)?,
                subquery: Subquery {
                    tokens: subquery.tokens.clone(),
                    resolved: Some(ResolvedSubquery::Rows(values)),
                },
                negated: *negated,
            }
        }
        Condition::Like { expr, pattern, case_insensitive, negated } => Condition::Like {
            expr: resolve_expr(expr, ctx)?,
            pattern: resolve_expr(pattern, ctx)?,
            case_insensitive: *case_insensitive,
            negated: *negated,
        },
        Condition::Exists { subquery, negated } => {
            let out = exec_subquery(&subquery.tokens, ctx)?;
            Condition::Exists {
                subquery: Subquery {
                    tokens: subquery.tokens.clone(),
                    resolved: Some(ResolvedSubquery::Exists(!out.rows.is_empty())),
                },
                negated: *negated,
            }
        }
    })
}

fn resolve_expr(expr: &Expr, ctx: &mut ExecCtx<'_>) -> Result<Expr> {
    Ok(match expr {
        Expr::Subquery(sq) => {
            let out = exec_subquery(&sq.tokens, ctx)?;
            let scalar = out.rows.first().map(|r| out.first_column(r)).unwrap_or(Value::Null);
            Expr::Subquery(Subquery {
                tokens: sq.tokens.clone(),
                resolved: Some(ResolvedSubquery::Scalar(scalar)),
            })
        }
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(resolve_expr(left, ctx)?),
            right: Box::new(resolve_expr(right, ctx)?),
        },
        Expr::Neg(inner) => Expr::Neg(Box::new(resolve_expr(inner, ctx)?)),
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(|a| resolve_expr(a, ctx)).collect::<Result<_>>()?,
        },
        Expr::Cast { expr, ty } => Expr::Cast { expr: Box::new(resolve_expr(expr, ctx)?), ty: *ty },
        Expr::Case { branches, otherwise } => Expr::Case {
            branches: branches
                .iter()
                .map(|b| {
                    Ok(CaseBranch {
                        when: resolve_condition(&b.when, ctx)?,
                        then: resolve_expr(&b.then, ctx)?,
                    })
                })
                .collect::<Result<_>>()?,
            otherwise: match otherwise {
                Some(e) => Some(Box::new(resolve_expr(e, ctx)?)),
                None => None,
            },
        },
        Expr::Literal(_) | Expr::Column(_) => expr.clone(),
    })
}

fn resolve_proj_columns(
    columns: &[quarry_sql::plan::ProjColumn],
    ctx: &mut ExecCtx<'_>,
) -> Result<Vec<quarry_sql::plan::ProjColumn>> {
    columns
        .iter()
        .map(|c| match c {
            quarry_sql::plan::ProjColumn::Expr { expr, alias } => {
                Ok(quarry_sql::plan::ProjColumn::Expr {
                    expr: resolve_expr(expr, ctx)?,
                    alias: alias.clone(),
                })
            }
            other => Ok(other.clone()),
        })
        .collect()
}

fn exec_subquery(tokens: &[Token], ctx: &mut ExecCtx<'_>) -> Result<ExecOutput> {
    let plan = parse_select(tokens, ctx.ctes.clone())?;
    ctx.run_subplan(&plan)
}

/// Pre-resolve a standalone condition (an UPDATE/DELETE WHERE) against
/// resolved state, outside any pipeline.
pub fn resolve_condition_against(cond: &Condition, state: &ResolvedState) -> Result<Condition> {
    let mut ctx = ExecCtx::new(state, Vec::new());
    resolve_condition(cond, &mut ctx)
}

/// The read set a standalone condition needs for its subqueries.
pub fn condition_read_set(cond: &Condition) -> ReadSet {
    let mut rs = ReadSet::new();
    let no_ctes = HashSet::new();
    let mut subs = Vec::new();
    cond_subqueries(cond, &mut subs);
    for sq in subs {
        add_token_tables(&sq.tokens, &no_ctes, &mut rs);
    }
    rs
}

/// Merge two rows the way join output does: used by `UPDATE … FROM` to
/// build the qualified evaluation context.
pub use join::merge_rows;

//─────────────────────────────
//  Set operations
//─────────────────────────────

fn set_op(left: ExecOutput, right: ExecOutput, op: SetOpKind, all: bool) -> Result<ExecOutput> {
    let columns = if left.columns.is_empty() { right.columns.clone() } else { left.columns.clone() };
    let rows = match op {
        SetOpKind::Union => {
            let mut rows: Vec<Row> = left.rows;
            rows.extend(right.rows);
            if !all {
                let mut seen = HashSet::new();
                let mut deduped = Vec::with_capacity(rows.len());
                for row in rows {
                    if seen.insert(row_key(&row)?) {
                        deduped.push(row);
                    }
                }
                deduped
            } else {
                rows
            }
        }
        SetOpKind::Except => {
            let mut right_counts: HashMap<Vec<u8>, usize> = HashMap::new();
            for row in &right.rows {
                *right_counts.entry(row_key(row)?).or_default() += 1;
            }
            let mut kept = Vec::new();
            let mut emitted = HashSet::new();
            for row in left.rows {
                let key = row_key(&row)?;
                if all {
                    // Multiset difference: each right occurrence cancels one.
                    match right_counts.get_mut(&key) {
                        Some(n) if *n > 0 => *n -= 1,
                        _ => kept.push(row),
                    }
                } else if !right_counts.contains_key(&key) && emitted.insert(key) {
                    kept.push(row);
                }
            }
            kept
        }
        SetOpKind::Intersect => {
            let mut right_counts: HashMap<Vec<u8>, usize> = HashMap::new();
            for row in &right.rows {
                *right_counts.entry(row_key(row)?).or_default() += 1;
            }
            let mut kept = Vec::new();
            let mut emitted = HashSet::new();
            for row in left.rows {
                let key = row_key(&row)?;
                if all {
                    if let Some(n) = right_counts.get_mut(&key) {
                        if *n > 0 {
                            *n -= 1;
                            kept.push(row);
                        }
                    }
                } else if right_counts.contains_key(&key) && emitted.insert(key) {
                    kept.push(row);
                }
            }
            kept
        }
    };
    Ok(ExecOutput { rows, columns })
}
