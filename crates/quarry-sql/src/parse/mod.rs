//! Recursive-descent parsers.
//!
//! [`classify`] is the dispatch step: it looks at the first one or two
//! tokens and decides which parse gate the statement belongs to. The
//! per-statement parsers live in the submodules and are pure functions from
//! token slices to statement structs or query plans.

mod cond;
mod ddl;
mod dml;
mod expr;
mod select;

pub use cond::parse_condition_tokens;
pub use expr::expr_display;

/// Parse a standalone expression out of a token slice.
pub fn parse_expr_tokens(tokens: &[Token]) -> Result<crate::plan::Expr> {
    let mut c = Cursor::new(tokens);
    let e = expr::parse_expr(&mut c)?;
    c.expect_end()?;
    Ok(e)
}
pub use ddl::{
    parse_add_column, parse_create_constraint, parse_create_index, parse_create_table,
    parse_create_trigger, parse_create_view, parse_drop_column, parse_drop_constraint,
    parse_drop_index, parse_drop_table, parse_drop_trigger, parse_drop_view, parse_rename_table,
};
pub use dml::{parse_delete, parse_insert, parse_update};
pub use select::parse_select;

use quarry_types::{Error, Result, Value};

use crate::plan::Cte;
use crate::token::{Token, TokenKind};

//─────────────────────────────
//  Dispatch
//─────────────────────────────

/// Where a statement routes after inspecting its leading tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// `CREATE TABLE …`
    CreateTable(Vec<Token>),
    /// `DROP TABLE …`
    DropTable(Vec<Token>),
    /// `INSERT INTO …`
    Insert(Vec<Token>),
    /// `SELECT …` (CTEs extracted from a leading WITH clause).
    Select {
        /// The SELECT tokens, WITH clause stripped.
        tokens: Vec<Token>,
        /// CTE tables carried alongside.
        ctes: Vec<Cte>,
    },
    /// `UPDATE …`
    Update(Vec<Token>),
    /// `DELETE FROM …`
    Delete(Vec<Token>),
    /// `TRUNCATE [TABLE] t` — routes straight to delete-all.
    Truncate {
        /// Target table.
        table: String,
    },
    /// `CREATE [UNIQUE] INDEX …`
    IndexCreate(Vec<Token>),
    /// `DROP INDEX …`
    IndexDrop(Vec<Token>),
    /// `CREATE VIEW …`
    ViewCreate(Vec<Token>),
    /// `DROP VIEW …`
    ViewDrop(Vec<Token>),
    /// `CREATE TRIGGER …`
    TriggerCreate(Vec<Token>),
    /// `DROP TRIGGER …`
    TriggerDrop(Vec<Token>),
    /// `ALTER TABLE … ADD COLUMN …`
    AlterAddColumn(Vec<Token>),
    /// `ALTER TABLE … DROP COLUMN …`
    AlterDropColumn(Vec<Token>),
    /// `ALTER TABLE … RENAME TO …`
    RenameTable(Vec<Token>),
    /// `ALTER TABLE … ADD CONSTRAINT …`
    ConstraintCreate(Vec<Token>),
    /// `ALTER TABLE … DROP CONSTRAINT …`
    ConstraintDrop(Vec<Token>),
    /// `BEGIN [TRANSACTION]`
    Begin,
    /// `COMMIT`
    Commit,
    /// `ROLLBACK`
    Rollback,
    /// `EXPLAIN <select>`
    Explain {
        /// The explained SELECT tokens.
        tokens: Vec<Token>,
        /// CTEs from a WITH clause inside the explained statement.
        ctes: Vec<Cte>,
    },
}

/// Inspect the leading tokens and pick a route.
///
/// Trailing semicolons are dropped first. Unrecognized leading tokens are a
/// parse error, which the dispatch gate surfaces as an `error` event.
pub fn classify(tokens: &[Token]) -> Result<Route> {
    let mut tokens = tokens.to_vec();
    while tokens.last().is_some_and(|t| t.is_symbol(";")) {
        tokens.pop();
    }
    let first = tokens
        .first()
        .ok_or_else(|| Error::Parse("empty statement".into()))?;
    let second = tokens.get(1);

    if first.is_kw("SELECT") {
        return Ok(Route::Select { tokens, ctes: Vec::new() });
    }
    if first.is_kw("WITH") {
        let (ctes, rest) = split_with_clause(&tokens)?;
        return Ok(Route::Select { tokens: rest, ctes });
    }
    if first.is_kw("CREATE") {
        return match second {
            Some(t) if t.is_kw("TABLE") => Ok(Route::CreateTable(tokens)),
            Some(t) if t.is_kw("UNIQUE") || t.is_kw("INDEX") => Ok(Route::IndexCreate(tokens)),
            Some(t) if t.is_kw("VIEW") => Ok(Route::ViewCreate(tokens)),
            Some(t) if t.is_kw("TRIGGER") => Ok(Route::TriggerCreate(tokens)),
            _ => Err(Error::Parse("unrecognized CREATE statement".into())),
        };
    }
    if first.is_kw("DROP") {
        return match second {
            Some(t) if t.is_kw("TABLE") => Ok(Route::DropTable(tokens)),
            Some(t) if t.is_kw("INDEX") => Ok(Route::IndexDrop(tokens)),
            Some(t) if t.is_kw("VIEW") => Ok(Route::ViewDrop(tokens)),
            Some(t) if t.is_kw("TRIGGER") => Ok(Route::TriggerDrop(tokens)),
            _ => Err(Error::Parse("unrecognized DROP statement".into())),
        };
    }
    if first.is_kw("INSERT") {
        return Ok(Route::Insert(tokens));
    }
    if first.is_kw("UPDATE") {
        return Ok(Route::Update(tokens));
    }
    if first.is_kw("DELETE") {
        return Ok(Route::Delete(tokens));
    }
    if first.is_kw("TRUNCATE") {
        let mut c = Cursor::new(&tokens);
        c.advance();
        c.eat_kw("TABLE");
        let table = c.expect_name()?;
        c.expect_end()?;
        return Ok(Route::Truncate { table });
    }
    if first.is_kw("ALTER") {
        let mut c = Cursor::new(&tokens);
        c.advance();
        c.expect_kw("TABLE")?;
        let _ = c.expect_name()?;
        return if c.eat_kw("ADD") {
            if c.eat_kw("CONSTRAINT") {
                Ok(Route::ConstraintCreate(tokens))
            } else {
                Ok(Route::AlterAddColumn(tokens))
            }
        } else if c.eat_kw("DROP") {
            if c.eat_kw("CONSTRAINT") {
                Ok(Route::ConstraintDrop(tokens))
            } else {
                Ok(Route::AlterDropColumn(tokens))
            }
        } else if c.eat_kw("RENAME") {
            Ok(Route::RenameTable(tokens))
        } else {
            Err(Error::Parse("unrecognized ALTER TABLE statement".into()))
        };
    }
    if first.is_kw("BEGIN") {
        return Ok(Route::Begin);
    }
    if first.is_kw("COMMIT") {
        return Ok(Route::Commit);
    }
    if first.is_kw("ROLLBACK") {
        return Ok(Route::Rollback);
    }
    if first.is_kw("EXPLAIN") {
        let rest = tokens[1..].to_vec();
        return match classify(&rest)? {
            Route::Select { tokens, ctes } => Ok(Route::Explain { tokens, ctes }),
            _ => Err(Error::Parse("EXPLAIN supports queries only".into())),
        };
    }

    Err(Error::Parse(format!("unrecognized statement '{}'", first.text)))
}

/// Split a leading `WITH [RECURSIVE] name [(cols)] AS (body), …` clause off
/// the statement, returning the CTE tables and the remaining tokens.
fn split_with_clause(tokens: &[Token]) -> Result<(Vec<Cte>, Vec<Token>)> {
    let mut c = Cursor::new(tokens);
    c.expect_kw("WITH")?;
    let recursive = c.eat_kw("RECURSIVE");
    let mut ctes = Vec::new();
    loop {
        let name = c.expect_name()?;
        let mut columns = Vec::new();
        if c.eat_symbol("(") {
            loop {
                columns.push(c.expect_name()?);
                if !c.eat_symbol(",") {
                    break;
                }
            }
            c.expect_symbol(")")?;
        }
        c.expect_kw("AS")?;
        let body = c.parenthesized()?;
        ctes.push(Cte { name, columns, tokens: body, recursive });
        if !c.eat_symbol(",") {
            break;
        }
    }
    Ok((ctes, c.rest().to_vec()))
}

//─────────────────────────────
//  Token cursor
//─────────────────────────────

/// Index-based cursor over a token slice. Cheap to save and restore, which
/// is how the condition parser backtracks on ambiguous parentheses.
#[derive(Debug)]
pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_at(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    pub(crate) fn advance(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn rest(&self) -> &'a [Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    pub(crate) fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_kw(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_symbol(&mut self, s: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_symbol(s)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_op(&mut self, op: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {kw}")))
        }
    }

    pub(crate) fn expect_symbol(&mut self, s: &str) -> Result<()> {
        if self.eat_symbol(s) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{s}'")))
        }
    }

    /// A name position accepts identifiers and (non-reserved use of)
    /// keywords alike; the text comes back as written.
    pub(crate) fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(t) if matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword) => {
                self.pos += 1;
                Ok(t.text.clone())
            }
            _ => Err(self.unexpected("expected a name")),
        }
    }

    /// A possibly-qualified column reference: `col` or `t.col`.
    pub(crate) fn expect_column_ref(&mut self) -> Result<String> {
        let mut name = self.expect_name()?;
        if self.peek().is_some_and(|t| t.is_symbol("."))
            && self
                .peek_at(1)
                .is_some_and(|t| matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword))
        {
            self.pos += 1;
            let tail = self.expect_name()?;
            name = format!("{name}.{tail}");
        }
        Ok(name)
    }

    pub(crate) fn expect_end(&mut self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("trailing tokens"))
        }
    }

    /// Collect the balanced token run inside parentheses; the cursor must
    /// sit on `(` and ends just past the matching `)`.
    pub(crate) fn parenthesized(&mut self) -> Result<Vec<Token>> {
        self.expect_symbol("(")?;
        let mut depth = 1usize;
        let mut out = Vec::new();
        loop {
            let t = self
                .advance()
                .ok_or_else(|| Error::Parse("unbalanced parentheses".into()))?;
            if t.is_symbol("(") {
                depth += 1;
            } else if t.is_symbol(")") {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
            }
            out.push(t.clone());
        }
    }

    pub(crate) fn unexpected(&self, what: &str) -> Error {
        match self.peek() {
            Some(t) => Error::Parse(format!("{what}, found '{}'", t.text)),
            None => Error::Parse(format!("{what}, found end of statement")),
        }
    }
}

//─────────────────────────────
//  Literals
//─────────────────────────────

/// Convert a literal token into a value. Numbers with a dot become floats.
pub(crate) fn literal_value(token: &Token) -> Result<Value> {
    match token.kind {
        TokenKind::Number => {
            if token.text.contains('.') {
                token
                    .text
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| Error::Parse(format!("bad number '{}'", token.text)))
            } else {
                token
                    .text
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| Error::Parse(format!("bad number '{}'", token.text)))
            }
        }
        TokenKind::Str => Ok(Value::Text(token.text.clone())),
        TokenKind::Boolean => Ok(Value::Bool(token.text.eq_ignore_ascii_case("TRUE"))),
        TokenKind::Null => Ok(Value::Null),
        _ => Err(Error::Parse(format!("expected a literal, found '{}'", token.text))),
    }
}
