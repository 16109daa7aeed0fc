//! DDL parsers: tables, indexes, views, triggers, constraints, ALTER forms.

use quarry_types::{ColumnDef, ColumnType, Error, Result};

use crate::stmt::{
    AddColumnStmt, CreateConstraintStmt, CreateIndexStmt, CreateTableAsSelect, CreateTableParsed,
    CreateTableStmt, CreateTriggerStmt, CreateViewStmt, DropColumnStmt, DropConstraintStmt,
    DropIndexStmt, DropTableStmt, DropTriggerStmt, DropViewStmt, RenameTableStmt,
};
use crate::token::{render, Token};

use super::{literal_value, Cursor};

//─────────────────────────────
//  CREATE / DROP TABLE
//─────────────────────────────

/// Parse `CREATE TABLE`, either the column-list form or `AS SELECT`.
pub fn parse_create_table(tokens: &[Token]) -> Result<CreateTableParsed> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("CREATE")?;
    c.expect_kw("TABLE")?;
    let mut if_not_exists = false;
    if c.eat_kw("IF") {
        c.expect_kw("NOT")?;
        c.expect_kw("EXISTS")?;
        if_not_exists = true;
    }
    let table = c.expect_name()?;

    if c.eat_kw("AS") {
        let select_tokens = c.rest().to_vec();
        if !select_tokens.first().is_some_and(|t| t.is_kw("SELECT")) {
            return Err(Error::Parse("expected SELECT after AS".into()));
        }
        return Ok(CreateTableParsed::AsSelect(CreateTableAsSelect { table, select_tokens }));
    }

    c.expect_symbol("(")?;
    let mut columns = Vec::new();
    loop {
        // Table-level constraints are recognized and skipped.
        if c.peek().is_some_and(|t| {
            t.is_kw("PRIMARY") || t.is_kw("UNIQUE") || t.is_kw("CHECK") || t.is_kw("FOREIGN")
                || t.is_kw("CONSTRAINT")
        }) {
            skip_table_constraint(&mut c)?;
        } else {
            columns.push(parse_column_def(&mut c)?);
        }
        if !c.eat_symbol(",") {
            break;
        }
    }
    c.expect_symbol(")")?;
    c.expect_end()?;

    if columns.is_empty() {
        return Err(Error::Parse("CREATE TABLE requires at least one column".into()));
    }
    Ok(CreateTableParsed::Table(CreateTableStmt { table, columns, if_not_exists }))
}

fn parse_column_def(c: &mut Cursor<'_>) -> Result<ColumnDef> {
    let name = c.expect_name()?;
    let ty_word = c.expect_name()?;
    let ty = ColumnType::from_keyword(&ty_word)
        .ok_or_else(|| Error::Parse(format!("unknown column type '{ty_word}'")))?;
    // Parenthesized size specs like VARCHAR(255) are skipped.
    if c.peek().is_some_and(|t| t.is_symbol("(")) {
        c.parenthesized()?;
    }

    let mut nullable = true;
    let mut default = None;
    loop {
        if c.eat_kw("NOT") {
            c.expect_kw("NULL")?;
            nullable = false;
        } else if c.eat_kw("PRIMARY") {
            c.expect_kw("KEY")?;
            nullable = false;
        } else if c.eat_kw("DEFAULT") {
            let t = c.advance().ok_or_else(|| Error::Parse("expected a DEFAULT literal".into()))?;
            default = Some(literal_value(t)?);
        } else if c.eat_kw("UNIQUE") {
            // Recognized, not enforced at the column level.
        } else if c.eat_kw("CHECK") {
            c.parenthesized()?;
        } else if c.eat_kw("REFERENCES") {
            let _ = c.expect_name()?;
            if c.peek().is_some_and(|t| t.is_symbol("(")) {
                c.parenthesized()?;
            }
        } else {
            break;
        }
    }
    Ok(ColumnDef { name, ty, nullable, default })
}

fn skip_table_constraint(c: &mut Cursor<'_>) -> Result<()> {
    // Consume tokens until the next top-level comma or the closing paren.
    let mut depth = 0usize;
    while let Some(t) = c.peek() {
        if depth == 0 && (t.is_symbol(",") || t.is_symbol(")")) {
            return Ok(());
        }
        if t.is_symbol("(") {
            depth += 1;
        } else if t.is_symbol(")") {
            depth -= 1;
        }
        c.advance();
    }
    Err(Error::Parse("unterminated table constraint".into()))
}

/// Parse `DROP TABLE [IF EXISTS] t`.
pub fn parse_drop_table(tokens: &[Token]) -> Result<DropTableStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("DROP")?;
    c.expect_kw("TABLE")?;
    let mut if_exists = false;
    if c.eat_kw("IF") {
        c.expect_kw("EXISTS")?;
        if_exists = true;
    }
    let table = c.expect_name()?;
    c.expect_end()?;
    Ok(DropTableStmt { table, if_exists })
}

//─────────────────────────────
//  Indexes
//─────────────────────────────

/// Parse `CREATE [UNIQUE] INDEX name ON table (column)`.
pub fn parse_create_index(tokens: &[Token]) -> Result<CreateIndexStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("CREATE")?;
    let unique = c.eat_kw("UNIQUE");
    c.expect_kw("INDEX")?;
    let name = c.expect_name()?;
    c.expect_kw("ON")?;
    let table = c.expect_name()?;
    c.expect_symbol("(")?;
    let column = c.expect_name()?;
    c.expect_symbol(")")?;
    c.expect_end()?;
    Ok(CreateIndexStmt { name, table, column, unique })
}

/// Parse `DROP INDEX name ON table`.
pub fn parse_drop_index(tokens: &[Token]) -> Result<DropIndexStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("DROP")?;
    c.expect_kw("INDEX")?;
    let name = c.expect_name()?;
    c.expect_kw("ON")?;
    let table = c.expect_name()?;
    c.expect_end()?;
    Ok(DropIndexStmt { name, table })
}

//─────────────────────────────
//  Views
//─────────────────────────────

/// Parse `CREATE VIEW name [(cols)] AS SELECT …`.
pub fn parse_create_view(tokens: &[Token]) -> Result<CreateViewStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("CREATE")?;
    c.expect_kw("VIEW")?;
    let name = c.expect_name()?;
    let mut columns = Vec::new();
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
    c.expect_kw("AS")?;
    let query_tokens = c.rest().to_vec();
    if !query_tokens.first().is_some_and(|t| t.is_kw("SELECT") || t.is_kw("WITH")) {
        return Err(Error::Parse("expected SELECT after AS".into()));
    }
    Ok(CreateViewStmt { name, columns, query: render(&query_tokens) })
}

/// Parse `DROP VIEW name`.
pub fn parse_drop_view(tokens: &[Token]) -> Result<DropViewStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("DROP")?;
    c.expect_kw("VIEW")?;
    let name = c.expect_name()?;
    c.expect_end()?;
    Ok(DropViewStmt { name })
}

//─────────────────────────────
//  Triggers
//─────────────────────────────

/// Parse `CREATE TRIGGER name BEFORE|AFTER INSERT|UPDATE|DELETE ON table
/// [FOR EACH ROW] <body>`; the body is persisted verbatim.
pub fn parse_create_trigger(tokens: &[Token]) -> Result<CreateTriggerStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("CREATE")?;
    c.expect_kw("TRIGGER")?;
    let name = c.expect_name()?;
    let timing = match c.advance() {
        Some(t) if t.is_kw("BEFORE") || t.is_kw("AFTER") => t.text.to_ascii_uppercase(),
        _ => return Err(Error::Parse("expected BEFORE or AFTER".into())),
    };
    let event = match c.advance() {
        Some(t) if t.is_kw("INSERT") || t.is_kw("UPDATE") || t.is_kw("DELETE") => {
            t.text.to_ascii_uppercase()
        }
        _ => return Err(Error::Parse("expected INSERT, UPDATE or DELETE".into())),
    };
    c.expect_kw("ON")?;
    let table = c.expect_name()?;
    if c.eat_kw("FOR") {
        c.expect_kw("EACH")?;
        c.expect_kw("ROW")?;
    }
    let body = render(c.rest());
    Ok(CreateTriggerStmt { name, timing, event, table, body })
}

/// Parse `DROP TRIGGER name`.
pub fn parse_drop_trigger(tokens: &[Token]) -> Result<DropTriggerStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("DROP")?;
    c.expect_kw("TRIGGER")?;
    let name = c.expect_name()?;
    c.expect_end()?;
    Ok(DropTriggerStmt { name })
}

//─────────────────────────────
//  ALTER TABLE forms
//─────────────────────────────

/// Parse `ALTER TABLE t ADD [COLUMN] coldef`.
pub fn parse_add_column(tokens: &[Token]) -> Result<AddColumnStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("ALTER")?;
    c.expect_kw("TABLE")?;
    let table = c.expect_name()?;
    c.expect_kw("ADD")?;
    c.eat_kw("COLUMN");
    let column = parse_column_def(&mut c)?;
    c.expect_end()?;
    Ok(AddColumnStmt { table, column })
}

/// Parse `ALTER TABLE t DROP [COLUMN] name`.
pub fn parse_drop_column(tokens: &[Token]) -> Result<DropColumnStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("ALTER")?;
    c.expect_kw("TABLE")?;
    let table = c.expect_name()?;
    c.expect_kw("DROP")?;
    c.eat_kw("COLUMN");
    let column = c.expect_name()?;
    c.expect_end()?;
    Ok(DropColumnStmt { table, column })
}

/// Parse `ALTER TABLE t RENAME TO new`.
pub fn parse_rename_table(tokens: &[Token]) -> Result<RenameTableStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("ALTER")?;
    c.expect_kw("TABLE")?;
    let table = c.expect_name()?;
    c.expect_kw("RENAME")?;
    c.expect_kw("TO")?;
    let to = c.expect_name()?;
    c.expect_end()?;
    Ok(RenameTableStmt { table, to })
}

/// Parse `ALTER TABLE t ADD CONSTRAINT name <body>`.
pub fn parse_create_constraint(tokens: &[Token]) -> Result<CreateConstraintStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("ALTER")?;
    c.expect_kw("TABLE")?;
    let table = c.expect_name()?;
    c.expect_kw("ADD")?;
    c.expect_kw("CONSTRAINT")?;
    let name = c.expect_name()?;
    let body = render(c.rest());
    if body.is_empty() {
        return Err(Error::Parse("constraint body is empty".into()));
    }
    Ok(CreateConstraintStmt { table, name, body })
}

/// Parse `ALTER TABLE t DROP CONSTRAINT name`.
pub fn parse_drop_constraint(tokens: &[Token]) -> Result<DropConstraintStmt> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("ALTER")?;
    c.expect_kw("TABLE")?;
    let table = c.expect_name()?;
    c.expect_kw("DROP")?;
    c.expect_kw("CONSTRAINT")?;
    let name = c.expect_name()?;
    c.expect_end()?;
    Ok(DropConstraintStmt { table, name })
}
