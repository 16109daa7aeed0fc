//! INSERT / UPDATE / DELETE parsers.

use quarry_types::{Error, Result, Row, Value};

use crate::plan::{CmpOp, Condition, Expr};
use crate::stmt::{
    ConflictAction, DeleteStmt, InsertRowStmt, InsertSelectStmt, OnConflict, ParsedInsert,
    Returning, UpdateStmt,
};
use crate::token::{Token, TokenKind};

use super::cond::parse_condition;
use super::expr::parse_expr;
use super::{literal_value, Cursor};

//─────────────────────────────
//  INSERT
//─────────────────────────────

/// Parse an INSERT statement.
///
/// `VALUES (…),(…)` fans out into one [`InsertRowStmt`] per tuple; a SELECT
/// source becomes an [`InsertSelectStmt`] carrying the unparsed tokens.
pub fn parse_insert(tokens: &[Token]) -> Result<ParsedInsert> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("INSERT")?;
    c.expect_kw("INTO")?;
    let table = c.expect_name()?;

    // Optional column list
    let mut columns: Vec<String> = Vec::new();
    if c.peek().is_some_and(|t| t.is_symbol("(")) {
        c.advance();
        loop {
            columns.push(c.expect_name()?);
            if !c.eat_symbol(",") {
                break;
            }
        }
        c.expect_symbol(")")?;
    }

    // SELECT source
    if c.peek().is_some_and(|t| t.is_kw("SELECT")) {
        let select_tokens = c.rest().to_vec();
        return Ok(ParsedInsert::Select(InsertSelectStmt {
            table,
            columns,
            select_tokens,
            create_table: false,
        }));
    }

    // DEFAULT VALUES
    if c.eat_kw("DEFAULT") {
        c.expect_kw("VALUES")?;
        let on_conflict = parse_on_conflict(&mut c)?;
        let returning = parse_returning(&mut c)?;
        c.expect_end()?;
        return Ok(ParsedInsert::Rows(vec![InsertRowStmt {
            table,
            row: Row::new(),
            positional: None,
            on_conflict,
            returning,
        }]));
    }

    // VALUES (…),(…)…
    c.expect_kw("VALUES")?;
    let mut tuples: Vec<Vec<Value>> = Vec::new();
    loop {
        c.expect_symbol("(")?;
        let mut tuple = Vec::new();
        loop {
            tuple.push(parse_literal_expr(&mut c)?);
            if !c.eat_symbol(",") {
                break;
            }
        }
        c.expect_symbol(")")?;
        tuples.push(tuple);
        if !c.eat_symbol(",") {
            break;
        }
    }

    let on_conflict = parse_on_conflict(&mut c)?;
    let returning = parse_returning(&mut c)?;
    c.expect_end()?;

    let mut rows = Vec::new();
    for tuple in tuples {
        if columns.is_empty() {
            // No column list: the execute gate maps the tuple onto the
            // schema's column order.
            rows.push(InsertRowStmt {
                table: table.clone(),
                row: Row::new(),
                positional: Some(tuple),
                on_conflict: on_conflict.clone(),
                returning: returning.clone(),
            });
            continue;
        }
        if tuple.len() != columns.len() {
            return Err(Error::Parse(format!(
                "{} values for {} columns",
                tuple.len(),
                columns.len()
            )));
        }
        let row: Row = columns.iter().cloned().zip(tuple).collect();
        rows.push(InsertRowStmt {
            table: table.clone(),
            row,
            positional: None,
            on_conflict: on_conflict.clone(),
            returning: returning.clone(),
        });
    }
    Ok(ParsedInsert::Rows(rows))
}

/// Values in a VALUES tuple must fold to literals.
fn parse_literal_expr(c: &mut Cursor<'_>) -> Result<Value> {
    match parse_expr(c)? {
        Expr::Literal(v) => Ok(v),
        other => Err(Error::Parse(format!(
            "expected a literal value in VALUES, found {other:?}"
        ))),
    }
}

fn parse_on_conflict(c: &mut Cursor<'_>) -> Result<Option<OnConflict>> {
    if !c.eat_kw("ON") {
        return Ok(None);
    }
    c.expect_kw("CONFLICT")?;
    let mut column = None;
    if c.eat_symbol("(") {
        column = Some(c.expect_name()?);
        c.expect_symbol(")")?;
    }
    c.expect_kw("DO")?;
    if c.eat_kw("NOTHING") {
        return Ok(Some(OnConflict { column, action: ConflictAction::Nothing }));
    }
    c.expect_kw("UPDATE")?;
    c.expect_kw("SET")?;
    let mut sets = Vec::new();
    loop {
        let col = c.expect_name()?;
        if !c.eat_op("=") {
            return Err(c.unexpected("expected '=' in DO UPDATE SET"));
        }
        sets.push((col, parse_expr(c)?));
        if !c.eat_symbol(",") {
            break;
        }
    }
    Ok(Some(OnConflict { column, action: ConflictAction::Update(sets) }))
}

fn parse_returning(c: &mut Cursor<'_>) -> Result<Option<Returning>> {
    if !c.eat_kw("RETURNING") {
        return Ok(None);
    }
    if c.eat_symbol("*") {
        return Ok(Some(Returning::All));
    }
    let mut cols = Vec::new();
    loop {
        cols.push(c.expect_column_ref()?);
        if !c.eat_symbol(",") {
            break;
        }
    }
    Ok(Some(Returning::Columns(cols)))
}

//─────────────────────────────
//  UPDATE
//─────────────────────────────

/// Parse an UPDATE statement, including the `FROM` cross-table form.
pub fn parse_update(tokens: &[Token]) -> Result<UpdateStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("UPDATE")?;
    let table = c.expect_name()?;
    c.expect_kw("SET")?;

    let mut changes = Row::new();
    let mut changes_exprs: Vec<(String, Expr)> = Vec::new();
    loop {
        let col = c.expect_name()?;
        if !c.eat_op("=") {
            return Err(c.unexpected("expected '=' in SET"));
        }
        match parse_expr(&mut c)? {
            Expr::Literal(v) => {
                changes.insert(col, v);
            }
            e => changes_exprs.push((col, e)),
        }
        if !c.eat_symbol(",") {
            break;
        }
    }

    let mut from_table = None;
    let mut from_alias = None;
    if c.eat_kw("FROM") {
        from_table = Some(c.expect_name()?);
        if c.eat_kw("AS") {
            from_alias = Some(c.expect_name()?);
        } else if c.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
            from_alias = Some(c.expect_name()?);
        }
    }

    let where_cond = if c.eat_kw("WHERE") {
        Some(parse_condition(&mut c)?)
    } else {
        None
    };
    let returning = parse_returning(&mut c)?;
    c.expect_end()?;

    Ok(UpdateStmt {
        table,
        changes,
        changes_exprs,
        where_cond,
        from_table,
        from_alias,
        returning,
    })
}

//─────────────────────────────
//  DELETE
//─────────────────────────────

/// Parse a DELETE statement. `WHERE id = N` is recognized as a direct id
/// target.
pub fn parse_delete(tokens: &[Token]) -> Result<DeleteStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("DELETE")?;
    c.expect_kw("FROM")?;
    let table = c.expect_name()?;

    let mut id = None;
    let mut where_cond = None;
    if c.eat_kw("WHERE") {
        let cond = parse_condition(&mut c)?;
        match &cond {
            Condition::Simple { column, op: CmpOp::Eq, value: Value::Int(n) } if column == "id" => {
                id = Some(*n);
            }
            _ => where_cond = Some(cond),
        }
    }
    let returning = parse_returning(&mut c)?;
    c.expect_end()?;

    Ok(DeleteStmt { table, id, where_cond, returning })
}
