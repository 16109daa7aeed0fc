//! WHERE / HAVING / IIF condition parser.
//!
//! Grammar over OR / AND / NOT / comparison with the leaf forms: grouped
//! sub-conditions, `IS [NOT] NULL`, `[NOT] IN (list | subquery)`,
//! `[NOT] LIKE/ILIKE`, `[NOT] BETWEEN low AND high` (expanded to
//! `>= AND <=`), `EXISTS (subquery)` and plain comparisons. A parenthesis
//! is ambiguous between a grouped condition and a parenthesized expression
//! operand; the parser tries the condition reading first and backtracks on
//! failure.

use quarry_types::Result;

use crate::plan::{CmpOp, Condition, Expr, Subquery};
use crate::token::{Token, TokenKind};

use super::expr::parse_expr;
use super::Cursor;

/// Parse a condition tree out of a standalone token slice.
pub fn parse_condition_tokens(tokens: &[Token]) -> Result<Condition> {
    let mut c = Cursor::new(tokens);
    let cond = parse_condition(&mut c)?;
    c.expect_end()?;
    Ok(cond)
}

/// Parse a condition at the cursor.
pub(crate) fn parse_condition(c: &mut Cursor<'_>) -> Result<Condition> {
    parse_or(c)
}

fn parse_or(c: &mut Cursor<'_>) -> Result<Condition> {
    let mut parts = vec![parse_and(c)?];
    while c.eat_kw("OR") {
        parts.push(parse_and(c)?);
    }
    if parts.len() == 1 {
        Ok(parts.pop().expect("single condition"))
    } else {
        Ok(Condition::Or(parts))
    }
}

fn parse_and(c: &mut Cursor<'_>) -> Result<Condition> {
    let mut parts = vec![parse_not(c)?];
    while c.eat_kw("AND") {
        parts.push(parse_not(c)?);
    }
    if parts.len() == 1 {
        Ok(parts.pop().expect("single condition"))
    } else {
        Ok(Condition::And(parts))
    }
}

fn parse_not(c: &mut Cursor<'_>) -> Result<Condition> {
    if c.eat_kw("NOT") {
        return Ok(Condition::Not(Box::new(parse_not(c)?)));
    }
    parse_primary(c)
}

fn parse_primary(c: &mut Cursor<'_>) -> Result<Condition> {
    // EXISTS (subquery)
    if c.peek().is_some_and(|t| t.is_kw("EXISTS")) {
        c.advance();
        let tokens = c.parenthesized()?;
        return Ok(Condition::Exists { subquery: Subquery::new(tokens), negated: false });
    }

    // Grouped sub-condition, unless the parenthesis actually opens an
    // expression operand like `(a + b) > 3` or a scalar subquery.
    if c.peek().is_some_and(|t| t.is_symbol("("))
        && !c.peek_at(1).is_some_and(|t| t.is_kw("SELECT"))
    {
        let save = c.pos();
        c.advance();
        if let Ok(group) = parse_or(c) {
            if c.eat_symbol(")") && !continues_expression(c.peek()) {
                return Ok(group);
            }
        }
        c.set_pos(save);
    }

    parse_predicate(c)
}

/// After a closed group, any operator means the parenthesis belonged to an
/// expression after all.
fn continues_expression(next: Option<&Token>) -> bool {
    match next {
        Some(t) => t.kind == TokenKind::Operator || t.is_symbol("*") || t.is_symbol("."),
        None => false,
    }
}

fn parse_predicate(c: &mut Cursor<'_>) -> Result<Condition> {
    let left = parse_expr(c)?;

    // IS [NOT] NULL
    if c.eat_kw("IS") {
        let negated = c.eat_kw("NOT");
        match c.advance() {
            Some(t) if t.kind == TokenKind::Null => {}
            _ => return Err(c.unexpected("expected NULL after IS")),
        }
        return Ok(Condition::IsNull { expr: left, negated });
    }

    // [NOT] IN / LIKE / ILIKE / BETWEEN
    let negated = c.eat_kw("NOT");
    if c.eat_kw("IN") {
        if c.peek_at(1).is_some_and(|t| t.is_kw("SELECT")) {
            let tokens = c.parenthesized()?;
            return Ok(Condition::InSubquery {
                expr: left,
                subquery: Subquery::new(tokens),
                negated,
            });
        }
        c.expect_symbol("(")?;
        let mut items = Vec::new();
        loop {
            items.push(parse_expr(c)?);
            if !c.eat_symbol(",") {
                break;
            }
        }
        c.expect_symbol(")")?;
        return Ok(Condition::InList { expr: left, items, negated });
    }
    if c.peek().is_some_and(|t| t.is_kw("LIKE") || t.is_kw("ILIKE")) {
        let case_insensitive = c.peek().is_some_and(|t| t.is_kw("ILIKE"));
        c.advance();
        let pattern = parse_expr(c)?;
        return Ok(Condition::Like { expr: left, pattern, case_insensitive, negated });
    }
    if c.eat_kw("BETWEEN") {
        let low = parse_expr(c)?;
        c.expect_kw("AND")?;
        let high = parse_expr(c)?;
        let range = Condition::And(vec![
            make_cmp(left.clone(), CmpOp::Gte, low),
            make_cmp(left, CmpOp::Lte, high),
        ]);
        return Ok(if negated { Condition::Not(Box::new(range)) } else { range });
    }
    if negated {
        return Err(c.unexpected("expected IN, LIKE or BETWEEN after NOT"));
    }

    // Plain comparison
    let op = match c.peek() {
        Some(t) if t.kind == TokenKind::Operator => CmpOp::from_text(&t.text)
            .ok_or_else(|| c.unexpected("expected a comparison operator"))?,
        _ => return Err(c.unexpected("expected a condition operator")),
    };
    c.advance();
    let right = parse_expr(c)?;
    Ok(make_cmp(left, op, right))
}

/// Collapse to the simple column-op-literal shape when both sides allow it;
/// the index rewrite keys off that form.
fn make_cmp(left: Expr, op: CmpOp, right: Expr) -> Condition {
    match (&left, &right) {
        (Expr::Column(column), Expr::Literal(value)) => Condition::Simple {
            column: column.clone(),
            op,
            value: value.clone(),
        },
        _ => Condition::Cmp { left, op, right },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;
    use quarry_types::Value;

    fn cond(sql: &str) -> Condition {
        parse_condition_tokens(&tokenize(sql).unwrap()).unwrap()
    }

    #[test]
    fn simple_shape_for_column_against_literal() {
        assert_eq!(
            cond("age > 25"),
            Condition::Simple { column: "age".into(), op: CmpOp::Gt, value: Value::Int(25) }
        );
    }

    #[test]
    fn general_shape_for_expression_sides() {
        assert!(matches!(cond("a + 1 = b"), Condition::Cmp { .. }));
        assert!(matches!(cond("(a + b) > 3"), Condition::Cmp { .. }));
    }

    #[test]
    fn and_or_nesting_with_precedence() {
        // AND binds tighter than OR.
        match cond("a = 1 OR b = 2 AND c = 3") {
            Condition::Or(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], Condition::And(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn grouped_condition_parses_without_backtracking_damage() {
        match cond("(a = 1 OR b = 2) AND c = 3") {
            Condition::And(parts) => {
                assert!(matches!(parts[0], Condition::Or(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn between_expands_to_range() {
        match cond("x BETWEEN 1 AND 5") {
            Condition::And(parts) => {
                assert_eq!(
                    parts[0],
                    Condition::Simple { column: "x".into(), op: CmpOp::Gte, value: Value::Int(1) }
                );
                assert_eq!(
                    parts[1],
                    Condition::Simple { column: "x".into(), op: CmpOp::Lte, value: Value::Int(5) }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(cond("x NOT BETWEEN 1 AND 5"), Condition::Not(_)));
    }

    #[test]
    fn is_null_and_negation() {
        assert_eq!(
            cond("email IS NULL"),
            Condition::IsNull { expr: Expr::Column("email".into()), negated: false }
        );
        assert_eq!(
            cond("email IS NOT NULL"),
            Condition::IsNull { expr: Expr::Column("email".into()), negated: true }
        );
    }

    #[test]
    fn in_list_and_in_subquery() {
        assert!(matches!(cond("x IN (1, 2, 3)"), Condition::InList { negated: false, .. }));
        assert!(matches!(cond("x NOT IN (1)"), Condition::InList { negated: true, .. }));
        assert!(matches!(
            cond("x IN (SELECT id FROM t)"),
            Condition::InSubquery { negated: false, .. }
        ));
    }

    #[test]
    fn like_flavors() {
        assert!(matches!(
            cond("name LIKE 'A%'"),
            Condition::Like { case_insensitive: false, negated: false, .. }
        ));
        assert!(matches!(
            cond("name NOT ILIKE '%x_'"),
            Condition::Like { case_insensitive: true, negated: true, .. }
        ));
    }

    #[test]
    fn exists_subquery() {
        assert!(matches!(cond("EXISTS (SELECT 1 FROM t)"), Condition::Exists { negated: false, .. }));
        assert!(matches!(cond("NOT EXISTS (SELECT 1 FROM t)"), Condition::Not(_)));
    }

    #[test]
    fn scalar_subquery_as_operand() {
        assert!(matches!(
            cond("(SELECT max(id) FROM t) > 5"),
            Condition::Cmp { left: Expr::Subquery(_), .. }
        ));
    }
}
