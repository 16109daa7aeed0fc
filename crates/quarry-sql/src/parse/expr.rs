//! Scalar expression parser.
//!
//! Precedence, loosest first: `||` (compiled to `CONCAT`), additive `+ -`,
//! multiplicative `* / %`, unary `-`, atoms. The `*` symbol only acts as
//! multiply here because this parser is always entered at an operand
//! position; a projection star never reaches it.

use quarry_types::{ColumnType, Error, Result};

use crate::plan::{BinOp, CaseBranch, Expr, Subquery};
use crate::token::TokenKind;

use super::cond::parse_condition;
use super::{literal_value, Cursor};

/// Parse one expression at the cursor.
pub(crate) fn parse_expr(c: &mut Cursor<'_>) -> Result<Expr> {
    parse_concat(c)
}

fn parse_concat(c: &mut Cursor<'_>) -> Result<Expr> {
    let mut left = parse_additive(c)?;
    while c.eat_op("||") {
        let right = parse_additive(c)?;
        left = Expr::Call { name: "CONCAT".into(), args: vec![left, right] };
    }
    Ok(left)
}

fn parse_additive(c: &mut Cursor<'_>) -> Result<Expr> {
    let mut left = parse_multiplicative(c)?;
    loop {
        let op = if c.eat_op("+") {
            BinOp::Add
        } else if c.eat_op("-") {
            BinOp::Sub
        } else {
            break;
        };
        let right = parse_multiplicative(c)?;
        left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
    }
    Ok(left)
}

fn parse_multiplicative(c: &mut Cursor<'_>) -> Result<Expr> {
    let mut left = parse_unary(c)?;
    loop {
        let op = if c.eat_symbol("*") {
            BinOp::Mul
        } else if c.eat_op("/") {
            BinOp::Div
        } else if c.eat_op("%") {
            BinOp::Mod
        } else {
            break;
        };
        let right = parse_unary(c)?;
        left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
    }
    Ok(left)
}

fn parse_unary(c: &mut Cursor<'_>) -> Result<Expr> {
    if c.eat_op("-") {
        return Ok(Expr::Neg(Box::new(parse_unary(c)?)));
    }
    parse_atom(c)
}

fn parse_atom(c: &mut Cursor<'_>) -> Result<Expr> {
    let token = c.peek().ok_or_else(|| c.unexpected("expected an expression"))?;

    // Literals
    if matches!(
        token.kind,
        TokenKind::Number | TokenKind::Str | TokenKind::Boolean | TokenKind::Null
    ) {
        let v = literal_value(token)?;
        c.advance();
        return Ok(Expr::Literal(v));
    }

    // CASE WHEN … THEN … [ELSE …] END
    if token.is_kw("CASE") {
        c.advance();
        return parse_case(c);
    }

    // CAST(expr AS type)
    if token.is_kw("CAST") {
        c.advance();
        c.expect_symbol("(")?;
        let inner = parse_expr(c)?;
        c.expect_kw("AS")?;
        let ty_word = c.expect_name()?;
        let ty = ColumnType::from_keyword(&ty_word)
            .ok_or_else(|| Error::Parse(format!("unknown type '{ty_word}' in CAST")))?;
        // Parenthesized size specs are accepted and ignored.
        if c.eat_symbol("(") {
            while !c.eat_symbol(")") {
                c.advance().ok_or_else(|| Error::Parse("unbalanced CAST type".into()))?;
            }
        }
        c.expect_symbol(")")?;
        return Ok(Expr::Cast { expr: Box::new(inner), ty });
    }

    // IIF(cond, a, b) desugars to CASE
    if token.kind == TokenKind::Identifier
        && token.text.eq_ignore_ascii_case("IIF")
        && c.peek_at(1).is_some_and(|t| t.is_symbol("("))
    {
        c.advance();
        c.expect_symbol("(")?;
        let when = parse_condition(c)?;
        c.expect_symbol(",")?;
        let then = parse_expr(c)?;
        c.expect_symbol(",")?;
        let otherwise = parse_expr(c)?;
        c.expect_symbol(")")?;
        return Ok(Expr::Case {
            branches: vec![CaseBranch { when, then }],
            otherwise: Some(Box::new(otherwise)),
        });
    }

    // Parenthesized: scalar subquery or grouped expression
    if token.is_symbol("(") {
        if c.peek_at(1).is_some_and(|t| t.is_kw("SELECT")) {
            let tokens = c.parenthesized()?;
            return Ok(Expr::Subquery(Subquery::new(tokens)));
        }
        c.advance();
        let inner = parse_expr(c)?;
        c.expect_symbol(")")?;
        return Ok(inner);
    }

    // Function call or column reference. Words that are keywords still act
    // as function names when a parenthesis follows (DATE('now')).
    if matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword) {
        if c.peek_at(1).is_some_and(|t| t.is_symbol("(")) {
            let name = token.text.to_ascii_uppercase();
            c.advance();
            c.expect_symbol("(")?;
            let mut args = Vec::new();
            if !c.eat_symbol(")") {
                loop {
                    // COUNT(*) in a HAVING position: the star stands in as a
                    // column reference so the display form round-trips.
                    if c.peek().is_some_and(|t| t.is_symbol("*")) {
                        c.advance();
                        args.push(Expr::Column("*".into()));
                    } else {
                        args.push(parse_expr(c)?);
                    }
                    if !c.eat_symbol(",") {
                        break;
                    }
                }
                c.expect_symbol(")")?;
            }
            return Ok(Expr::Call { name, args });
        }
        if token.kind == TokenKind::Identifier {
            let name = c.expect_column_ref()?;
            return Ok(Expr::Column(name));
        }
    }

    Err(c.unexpected("expected an expression"))
}

fn parse_case(c: &mut Cursor<'_>) -> Result<Expr> {
    let mut branches = Vec::new();
    while c.eat_kw("WHEN") {
        let when = parse_condition(c)?;
        c.expect_kw("THEN")?;
        let then = parse_expr(c)?;
        branches.push(CaseBranch { when, then });
    }
    if branches.is_empty() {
        return Err(Error::Parse("CASE requires at least one WHEN branch".into()));
    }
    let otherwise = if c.eat_kw("ELSE") {
        Some(Box::new(parse_expr(c)?))
    } else {
        None
    };
    c.expect_kw("END")?;
    Ok(Expr::Case { branches, otherwise })
}

/// Render an expression back to a display string, used for derived output
/// column names and the synthetic aggregate keys.
pub fn expr_display(expr: &Expr) -> String {
    match expr {
        Expr::Literal(v) => v.display_string(),
        Expr::Column(name) => name.clone(),
        Expr::Binary { op, left, right } => {
            let sym = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Mod => "%",
            };
            format!("{} {} {}", expr_display(left), sym, expr_display(right))
        }
        Expr::Neg(inner) => format!("-{}", expr_display(inner)),
        Expr::Call { name, args } => {
            let rendered: Vec<String> = args.iter().map(expr_display).collect();
            format!("{}({})", name, rendered.join(", "))
        }
        Expr::Cast { expr, .. } => format!("CAST({})", expr_display(expr)),
        Expr::Case { .. } => "CASE".to_string(),
        Expr::Subquery(_) => "(subquery)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Condition;
    use crate::token::tokenize;
    use quarry_types::Value;

    fn expr(sql: &str) -> Expr {
        let tokens = tokenize(sql).unwrap();
        let mut c = Cursor::new(&tokens);
        let e = parse_expr(&mut c).unwrap();
        assert!(c.at_end(), "unconsumed input in {sql:?}");
        e
    }

    #[test]
    fn precedence_multiplies_before_adding() {
        let e = expr("1 + 2 * 3");
        match e {
            Expr::Binary { op: BinOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn concat_compiles_to_call() {
        let e = expr("a || 'x'");
        match e {
            Expr::Call { name, args } => {
                assert_eq!(name, "CONCAT");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn qualified_columns_keep_the_dot() {
        assert_eq!(expr("users.name"), Expr::Column("users.name".into()));
    }

    #[test]
    fn iif_desugars_to_case() {
        let e = expr("IIF(a > 1, 'big', 'small')");
        match e {
            Expr::Case { branches, otherwise } => {
                assert_eq!(branches.len(), 1);
                assert!(matches!(branches[0].when, Condition::Cmp { .. } | Condition::Simple { .. }));
                assert!(otherwise.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cast_parses_type_keyword() {
        let e = expr("CAST(x AS INTEGER)");
        assert!(matches!(e, Expr::Cast { ty: quarry_types::ColumnType::Integer, .. }));
    }

    #[test]
    fn unary_minus_on_columns() {
        assert_eq!(expr("-x"), Expr::Neg(Box::new(Expr::Column("x".into()))));
    }

    #[test]
    fn negative_literal_comes_from_the_tokenizer() {
        assert_eq!(expr("-5"), Expr::Literal(Value::Int(-5)));
    }

    #[test]
    fn scalar_subquery_keeps_tokens() {
        let e = expr("(SELECT max(id) FROM t)");
        match e {
            Expr::Subquery(sq) => {
                assert!(sq.tokens[0].is_kw("SELECT"));
                assert!(sq.resolved.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
