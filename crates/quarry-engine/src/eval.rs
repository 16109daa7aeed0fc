//! Scalar expression and condition evaluation.
//!
//! Everything here is pure over a row context. Column lookup is the
//! qualified-resolution rule: try the reference as written, then its bare
//! suffix. Non-fatal cases (unknown function, type mismatch in arithmetic)
//! evaluate to Null rather than erroring; comparisons against Null are
//! false. Subqueries must carry their pre-evaluation annotation by the time
//! expressions run; the executor attaches it.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Utc;
use once_cell::sync::Lazy;

use quarry_sql::parse::expr_display;
use quarry_sql::plan::{AggFunc, BinOp, CmpOp, Condition, Expr, ResolvedSubquery};
use quarry_types::{canonicalize, ColumnType, Error, Result, Row, Value};

//─────────────────────────────
//  Column lookup
//─────────────────────────────

/// Look a column reference up in a row: full form first, then bare suffix.
pub fn lookup_opt(row: &Row, name: &str) -> Option<Value> {
    if let Some(v) = row.get(name) {
        return Some(v.clone());
    }
    if let Some((_, bare)) = name.rsplit_once('.') {
        if let Some(v) = row.get(bare) {
            return Some(v.clone());
        }
    }
    None
}

/// Like [`lookup_opt`], absent resolves to Null.
pub fn lookup(row: &Row, name: &str) -> Value {
    lookup_opt(row, name).unwrap_or(Value::Null)
}

//─────────────────────────────
//  Expression evaluation
//─────────────────────────────

/// Evaluate a scalar expression against a row.
pub fn eval_expr(expr: &Expr, row: &Row) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => Ok(lookup(row, name)),
        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, row)?;
            let r = eval_expr(right, row)?;
            Ok(eval_binary(*op, &l, &r))
        }
        Expr::Neg(inner) => Ok(match eval_expr(inner, row)? {
            Value::Int(i) => Value::Int(-i),
            Value::Float(f) => Value::Float(-f),
            _ => Value::Null,
        }),
        Expr::Call { name, args } => eval_call(name, args, row),
        Expr::Cast { expr, ty } => Ok(cast_value(&eval_expr(expr, row)?, *ty)),
        Expr::Case { branches, otherwise } => {
            for branch in branches {
                if eval_condition(&branch.when, row)? {
                    return eval_expr(&branch.then, row);
                }
            }
            match otherwise {
                Some(e) => eval_expr(e, row),
                None => Ok(Value::Null),
            }
        }
        Expr::Subquery(sq) => match &sq.resolved {
            Some(ResolvedSubquery::Scalar(v)) => Ok(v.clone()),
            Some(ResolvedSubquery::Exists(b)) => Ok(Value::Bool(*b)),
            Some(ResolvedSubquery::Rows(_)) | None => {
                Err(Error::Runtime("subquery was not pre-resolved".into()))
            }
        },
    }
}

fn eval_binary(op: BinOp, l: &Value, r: &Value) -> Value {
    let (li, ri) = (l.as_int(), r.as_int());
    let (lf, rf) = (l.as_f64(), r.as_f64());
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul => {
            if let (Some(a), Some(b)) = (li, ri) {
                let out = match op {
                    BinOp::Add => a.checked_add(b),
                    BinOp::Sub => a.checked_sub(b),
                    _ => a.checked_mul(b),
                };
                out.map(Value::Int).unwrap_or(Value::Null)
            } else if let (Some(a), Some(b)) = (lf, rf) {
                let out = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    _ => a * b,
                };
                Value::Float(out)
            } else {
                Value::Null
            }
        }
        BinOp::Div => {
            if let (Some(a), Some(b)) = (li, ri) {
                if b == 0 {
                    Value::Null
                } else {
                    Value::Int(a / b)
                }
            } else if let (Some(a), Some(b)) = (lf, rf) {
                if b == 0.0 {
                    Value::Null
                } else {
                    Value::Float(a / b)
                }
            } else {
                Value::Null
            }
        }
        BinOp::Mod => {
            if let (Some(a), Some(b)) = (li, ri) {
                if b == 0 {
                    Value::Null
                } else {
                    Value::Int(a % b)
                }
            } else if let (Some(a), Some(b)) = (lf, rf) {
                if b == 0.0 {
                    Value::Null
                } else {
                    Value::Float(a % b)
                }
            } else {
                Value::Null
            }
        }
    }
}

//─────────────────────────────
//  Function calls
//─────────────────────────────

type ScalarFn = fn(&[Value]) -> Value;

/// Scalar function registry. Unknown names evaluate to Null, not errors.
static FUNCTIONS: Lazy<HashMap<&'static str, ScalarFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, ScalarFn> = HashMap::new();
    m.insert("UPPER", |args| text_fn(args, |s| s.to_uppercase()));
    m.insert("LOWER", |args| text_fn(args, |s| s.to_lowercase()));
    m.insert("TRIM", |args| text_fn(args, |s| s.trim().to_string()));
    m.insert("LTRIM", |args| text_fn(args, |s| s.trim_start().to_string()));
    m.insert("RTRIM", |args| text_fn(args, |s| s.trim_end().to_string()));
    m.insert("LENGTH", |args| match args.first() {
        Some(Value::Text(s)) => Value::Int(s.chars().count() as i64),
        _ => Value::Null,
    });
    m.insert("SUBSTR", substr);
    m.insert("SUBSTRING", substr);
    m.insert("REPLACE", |args| match args {
        [Value::Text(s), Value::Text(from), Value::Text(to)] => {
            Value::Text(s.replace(from.as_str(), to))
        }
        _ => Value::Null,
    });
    m.insert("CONCAT", |args| {
        if args.iter().any(Value::is_null) {
            return Value::Null;
        }
        Value::Text(args.iter().map(Value::display_string).collect())
    });
    m.insert("ABS", |args| match args.first() {
        Some(Value::Int(i)) => Value::Int(i.abs()),
        Some(Value::Float(f)) => Value::Float(f.abs()),
        _ => Value::Null,
    });
    m.insert("ROUND", |args| match args {
        [Value::Float(f)] => Value::Float(f.round()),
        [Value::Int(i)] => Value::Int(*i),
        [Value::Float(f), Value::Int(d)] => {
            let p = 10f64.powi(*d as i32);
            Value::Float((f * p).round() / p)
        }
        [Value::Int(i), Value::Int(_)] => Value::Int(*i),
        _ => Value::Null,
    });
    m.insert("FLOOR", |args| match args.first() {
        Some(Value::Float(f)) => Value::Int(f.floor() as i64),
        Some(Value::Int(i)) => Value::Int(*i),
        _ => Value::Null,
    });
    m.insert("CEIL", ceil);
    m.insert("CEILING", ceil);
    m.insert("MOD", |args| match args {
        [a, b] => eval_binary(BinOp::Mod, a, b),
        _ => Value::Null,
    });
    m.insert("COALESCE", |args| {
        args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)
    });
    m.insert("IFNULL", |args| match args {
        [a, b] => {
            if a.is_null() {
                b.clone()
            } else {
                a.clone()
            }
        }
        _ => Value::Null,
    });
    m.insert("NULLIF", |args| match args {
        [a, b] => {
            if values_equal(a, b) {
                Value::Null
            } else {
                a.clone()
            }
        }
        _ => Value::Null,
    });
    m.insert("TYPEOF", |args| match args.first() {
        Some(v) => Value::Text(v.type_name().to_string()),
        None => Value::Null,
    });
    m.insert("GREATEST", |args| extreme(args, Ordering::Greater));
    m.insert("LEAST", |args| extreme(args, Ordering::Less));
    m.insert("NOW", |_| Value::Text(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()));
    m.insert("CURRENT_TIMESTAMP", |_| {
        Value::Text(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
    });
    m.insert("CURRENT_DATE", |_| Value::Text(Utc::now().format("%Y-%m-%d").to_string()));
    m.insert("DATE", |args| match args.first() {
        None => Value::Text(Utc::now().format("%Y-%m-%d").to_string()),
        Some(Value::Text(s)) if s.eq_ignore_ascii_case("now") => {
            Value::Text(Utc::now().format("%Y-%m-%d").to_string())
        }
        // Date portion of a timestamp-like string.
        Some(Value::Text(s)) if s.len() >= 10 => Value::Text(s[..10].to_string()),
        _ => Value::Null,
    });
    m
});

fn text_fn(args: &[Value], f: impl Fn(&str) -> String) -> Value {
    match args.first() {
        Some(Value::Text(s)) => Value::Text(f(s)),
        _ => Value::Null,
    }
}

fn substr(args: &[Value]) -> Value {
    let (s, start, len) = match args {
        [Value::Text(s), Value::Int(start)] => (s, *start, None),
        [Value::Text(s), Value::Int(start), Value::Int(len)] => (s, *start, Some(*len)),
        _ => return Value::Null,
    };
    let chars: Vec<char> = s.chars().collect();
    // One-based start, SQL style.
    let begin = (start.max(1) - 1) as usize;
    if begin >= chars.len() {
        return Value::Text(String::new());
    }
    let end = match len {
        Some(l) if l >= 0 => (begin + l as usize).min(chars.len()),
        Some(_) => begin,
        None => chars.len(),
    };
    Value::Text(chars[begin..end].iter().collect())
}

fn ceil(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Float(f)) => Value::Int(f.ceil() as i64),
        Some(Value::Int(i)) => Value::Int(*i),
        _ => Value::Null,
    }
}

fn extreme(args: &[Value], keep: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for v in args.iter().filter(|v| !v.is_null()) {
        best = match best {
            None => Some(v),
            Some(b) if v.total_cmp(b) == keep => Some(v),
            Some(b) => Some(b),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

fn eval_call(name: &str, args: &[Expr], row: &Row) -> Result<Value> {
    // Aggregate names evaluated against a post-aggregate row resolve
    // through the synthetic key the aggregate step wrote (HAVING path).
    if AggFunc::from_name(name).is_some() {
        let rendered: Vec<String> = args.iter().map(expr_display).collect();
        let key = format!("{}({})", name, rendered.join(", "));
        if let Some(v) = row.get(&key) {
            return Ok(v.clone());
        }
    }
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(arg, row)?);
    }
    match FUNCTIONS.get(name) {
        Some(f) => Ok(f(&values)),
        // Unknown functions are non-fatal.
        None => Ok(Value::Null),
    }
}

//─────────────────────────────
//  Casts
//─────────────────────────────

/// `CAST(x AS type)` semantics; a failed conversion is Null.
pub fn cast_value(v: &Value, ty: ColumnType) -> Value {
    match ty {
        ColumnType::Integer => match v {
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Int(*f as i64),
            Value::Text(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
            Value::Bool(b) => Value::Int(i64::from(*b)),
            _ => Value::Null,
        },
        ColumnType::Real => match v {
            Value::Int(i) => Value::Float(*i as f64),
            Value::Float(f) => Value::Float(*f),
            Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
            Value::Bool(b) => Value::Float(f64::from(u8::from(*b))),
            _ => Value::Null,
        },
        ColumnType::Text | ColumnType::Date | ColumnType::Timestamp | ColumnType::Blob => match v {
            Value::Null => Value::Null,
            other => Value::Text(other.display_string()),
        },
        ColumnType::Boolean => match v {
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(i) => Value::Bool(*i != 0),
            Value::Float(f) => Value::Bool(*f != 0.0),
            Value::Text(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Value::Bool(true),
                "false" | "f" | "0" => Value::Bool(false),
                _ => Value::Null,
            },
            _ => Value::Null,
        },
    }
}

//─────────────────────────────
//  Comparison
//─────────────────────────────

/// Value equality for predicates: numeric across Int/Float, strict variant
/// match otherwise. Null equals nothing.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering for predicates; `None` when the values are not comparable.
pub fn comparable_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

/// Apply a comparison operator. Any Null operand makes the result false.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match op {
        CmpOp::Eq => values_equal(a, b),
        CmpOp::Neq => !values_equal(a, b),
        CmpOp::Lt => comparable_cmp(a, b) == Some(Ordering::Less),
        CmpOp::Gt => comparable_cmp(a, b) == Some(Ordering::Greater),
        CmpOp::Lte => matches!(comparable_cmp(a, b), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gte => matches!(comparable_cmp(a, b), Some(Ordering::Greater | Ordering::Equal)),
    }
}

//─────────────────────────────
//  Conditions
//─────────────────────────────

/// Evaluate a condition tree against a row. Subqueries must already carry
/// their resolved annotation.
pub fn eval_condition(cond: &Condition, row: &Row) -> Result<bool> {
    match cond {
        Condition::And(parts) => {
            for p in parts {
                if !eval_condition(p, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(parts) => {
            for p in parts {
                if eval_condition(p, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!eval_condition(inner, row)?),
        Condition::Simple { column, op, value } => Ok(compare(*op, &lookup(row, column), value)),
        Condition::Cmp { left, op, right } => {
            let l = eval_expr(left, row)?;
            let r = eval_expr(right, row)?;
            Ok(compare(*op, &l, &r))
        }
        Condition::IsNull { expr, negated } => {
            let v = eval_expr(expr, row)?;
            Ok(v.is_null() != *negated)
        }
        Condition::InList { expr, items, negated } => {
            let v = eval_expr(expr, row)?;
            if v.is_null() {
                return Ok(false);
            }
            let mut found = false;
            for item in items {
                if values_equal(&v, &eval_expr(item, row)?) {
                    found = true;
                    break;
                }
            }
            Ok(found != *negated)
        }
        Condition::InSubquery { expr, subquery, negated } => {
            let v = eval_expr(expr, row)?;
            if v.is_null() {
                return Ok(false);
            }
            let rows = match &subquery.resolved {
                Some(ResolvedSubquery::Rows(rows)) => rows,
                _ => return Err(Error::Runtime("IN subquery was not pre-resolved".into())),
            };
            let found = rows.iter().any(|candidate| values_equal(&v, candidate));
            Ok(found != *negated)
        }
        Condition::Like { expr, pattern, case_insensitive, negated } => {
            let v = eval_expr(expr, row)?;
            let p = eval_expr(pattern, row)?;
            let matched = match (v.as_str(), p.as_str()) {
                (Some(s), Some(pat)) => like_match(s, pat, *case_insensitive),
                _ => false,
            };
            Ok(matched != *negated)
        }
        Condition::Exists { subquery, negated } => {
            let exists = match &subquery.resolved {
                Some(ResolvedSubquery::Exists(b)) => *b,
                _ => return Err(Error::Runtime("EXISTS subquery was not pre-resolved".into())),
            };
            Ok(exists != *negated)
        }
    }
}

/// `%` / `_` wildcard matching.
pub fn like_match(s: &str, pattern: &str, case_insensitive: bool) -> bool {
    fn rec(s: &[char], p: &[char]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some('%') => rec(s, &p[1..]) || (!s.is_empty() && rec(&s[1..], p)),
            Some('_') => !s.is_empty() && rec(&s[1..], &p[1..]),
            Some(c) => s.first() == Some(c) && rec(&s[1..], &p[1..]),
        }
    }
    let (s, p): (Vec<char>, Vec<char>) = if case_insensitive {
        (s.to_lowercase().chars().collect(), pattern.to_lowercase().chars().collect())
    } else {
        (s.chars().collect(), pattern.chars().collect())
    };
    rec(&s, &p)
}

//─────────────────────────────
//  Row keys
//─────────────────────────────

/// Canonical bytes of a whole row, the distinct/set-op identity.
pub fn row_key(row: &Row) -> Result<Vec<u8>> {
    canonicalize(&Value::Map(row.clone()))
}

/// Canonical bytes of selected columns of a row.
pub fn row_key_of(row: &Row, columns: &[String]) -> Result<Vec<u8>> {
    let mut sub = Row::new();
    for c in columns {
        sub.insert(c.clone(), lookup(row, c));
    }
    row_key(&sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_sql::parse::parse_condition_tokens;
    use quarry_sql::tokenize;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn check(cond_sql: &str, r: &Row) -> bool {
        let cond = parse_condition_tokens(&tokenize(cond_sql).unwrap()).unwrap();
        eval_condition(&cond, r).unwrap()
    }

    #[test]
    fn qualified_lookup_falls_back_to_bare_suffix() {
        let r = row(&[("x", Value::Int(1))]);
        assert_eq!(lookup(&r, "a.x"), Value::Int(1));
        assert_eq!(lookup(&r, "a.y"), Value::Null);
    }

    #[test]
    fn arithmetic_keeps_integers_integral() {
        let r = Row::new();
        let e = |sql: &str| {
            let expr = quarry_sql::parse::parse_expr_tokens(&tokenize(sql).unwrap()).unwrap();
            eval_expr(&expr, &r).unwrap()
        };
        assert_eq!(e("7 / 2"), Value::Int(3));
        assert_eq!(e("7.0 / 2"), Value::Float(3.5));
        assert_eq!(e("7 % 3"), Value::Int(1));
        assert_eq!(e("7 / 0"), Value::Null);
        assert_eq!(e("1 + 2 * 3"), Value::Int(7));
        assert_eq!(e("'a' || 'b'"), Value::Text("ab".into()));
    }

    #[test]
    fn null_comparisons_are_false() {
        let r = row(&[("age", Value::Null)]);
        assert!(!check("age > 10", &r));
        assert!(!check("age = 10", &r));
        assert!(check("age IS NULL", &r));
        assert!(!check("age IS NOT NULL", &r));
    }

    #[test]
    fn between_and_in() {
        let r = row(&[("x", Value::Int(3))]);
        assert!(check("x BETWEEN 1 AND 5", &r));
        assert!(!check("x BETWEEN 4 AND 5", &r));
        assert!(check("x IN (1, 3, 5)", &r));
        assert!(check("x NOT IN (2, 4)", &r));
    }

    #[test]
    fn like_wildcards() {
        assert!(like_match("Alice", "A%", false));
        assert!(like_match("Alice", "_lice", false));
        assert!(!like_match("alice", "A%", false));
        assert!(like_match("alice", "A%", true));
        assert!(like_match("a_c", "a_c", false));
        assert!(!like_match("ac", "a_c", false));
        assert!(like_match("", "%", false));
    }

    #[test]
    fn case_expression_branches() {
        let r = row(&[("n", Value::Int(2))]);
        let expr = quarry_sql::parse::parse_expr_tokens(
            &tokenize("CASE WHEN n = 1 THEN 'one' WHEN n = 2 THEN 'two' ELSE 'many' END").unwrap(),
        )
        .unwrap();
        assert_eq!(eval_expr(&expr, &r).unwrap(), Value::Text("two".into()));
    }

    #[test]
    fn scalar_functions() {
        let r = Row::new();
        let e = |sql: &str| {
            let expr = quarry_sql::parse::parse_expr_tokens(&tokenize(sql).unwrap()).unwrap();
            eval_expr(&expr, &r).unwrap()
        };
        assert_eq!(e("UPPER('abc')"), Value::Text("ABC".into()));
        assert_eq!(e("LENGTH('abcd')"), Value::Int(4));
        assert_eq!(e("SUBSTR('hello', 2, 3)"), Value::Text("ell".into()));
        assert_eq!(e("COALESCE(NULL, NULL, 3)"), Value::Int(3));
        assert_eq!(e("NULLIF(1, 1)"), Value::Null);
        assert_eq!(e("IFNULL(NULL, 9)"), Value::Int(9));
        assert_eq!(e("GREATEST(1, 9, 4)"), Value::Int(9));
        assert_eq!(e("LEAST(5, 2, 8)"), Value::Int(2));
        assert_eq!(e("TYPEOF('x')"), Value::Text("text".into()));
        assert_eq!(e("CAST('42' AS INTEGER)"), Value::Int(42));
        assert_eq!(e("CAST(1 AS BOOLEAN)"), Value::Bool(true));
        // Unknown functions yield Null, not an error.
        assert_eq!(e("NO_SUCH_FN(1)"), Value::Null);
    }

    #[test]
    fn aggregate_call_resolves_through_synthetic_key() {
        let r = row(&[("SUM(amount)", Value::Int(30)), ("region", Value::Text("N".into()))]);
        assert!(check("SUM(amount) > 10", &r));
        assert!(!check("SUM(amount) > 100", &r));
    }
}
