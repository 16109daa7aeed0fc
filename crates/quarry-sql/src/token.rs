//! SQL tokenizer.
//!
//! Turns SQL text into a flat token stream. Word classification compares
//! against a fixed uppercase keyword set while the token text preserves the
//! original case; quoted words are identifiers regardless of spelling.

use serde::{Deserialize, Serialize};

use quarry_types::{Error, Result};

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Reserved word.
    Keyword,
    /// Table/column/alias name.
    Identifier,
    /// Integer or float literal.
    Number,
    /// Single-quoted string literal (quotes stripped, `''` unescaped).
    Str,
    /// Comparison/arithmetic operator.
    Operator,
    /// Punctuation: `(` `)` `,` `*` `.` `;`.
    Symbol,
    /// `TRUE` / `FALSE`.
    Boolean,
    /// `NULL`.
    Null,
}

/// One token: kind plus original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Classification.
    pub kind: TokenKind,
    /// Text as written (identifiers and keywords keep their case; string
    /// literals are unquoted).
    pub text: String,
}

impl Token {
    /// Case-insensitive keyword test.
    pub fn is_kw(&self, kw: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(kw)
    }

    /// Symbol test.
    pub fn is_symbol(&self, s: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == s
    }

    /// Operator test.
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }
}

/// Render tokens back to SQL text (string literals re-quoted). Used where
/// a clause is persisted verbatim: view queries, trigger bodies,
/// constraint bodies.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, t) in tokens.iter().enumerate() {
        let piece = match t.kind {
            TokenKind::Str => format!("'{}'", t.text.replace('\'', "''")),
            _ => t.text.clone(),
        };
        let no_space_before = matches!(piece.as_str(), ")" | "," | ";" | ".") ;
        let no_space_after_prev = i > 0 && matches!(tokens[i - 1].text.as_str(), "(" | ".");
        if i > 0 && !no_space_before && !no_space_after_prev {
            out.push(' ');
        }
        out.push_str(&piece);
    }
    out
}

/// Fixed keyword set; classification is case-insensitive.
const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "CREATE",
    "TABLE", "DROP", "INDEX", "VIEW", "TRIGGER", "ALTER", "ADD", "COLUMN", "RENAME", "TO",
    "CONSTRAINT", "IF", "NOT", "EXISTS", "PRIMARY", "KEY", "DEFAULT", "UNIQUE", "ON", "CONFLICT",
    "DO", "NOTHING", "RETURNING", "AND", "OR", "LIKE", "ILIKE", "IN", "BETWEEN", "IS", "JOIN",
    "LEFT", "RIGHT", "FULL", "INNER", "OUTER", "CROSS", "GROUP", "BY", "HAVING", "ORDER", "ASC",
    "DESC", "LIMIT", "OFFSET", "UNION", "ALL", "EXCEPT", "INTERSECT", "DISTINCT", "AS", "CASE",
    "WHEN", "THEN", "ELSE", "END", "WITH", "RECURSIVE", "BEGIN", "COMMIT", "ROLLBACK",
    "TRANSACTION", "EXPLAIN", "TRUNCATE", "CAST", "NULLS", "FIRST", "LAST", "OVER", "PARTITION",
    "SEPARATOR", "BEFORE", "AFTER", "FOR", "EACH", "ROW", "CHECK", "FOREIGN", "REFERENCES",
    "INTEGER", "INT", "BIGINT", "SMALLINT", "SERIAL", "TEXT", "VARCHAR", "CHAR", "STRING", "REAL",
    "FLOAT", "DOUBLE", "DECIMAL", "NUMERIC", "BOOLEAN", "BOOL", "BLOB", "BYTEA", "DATE",
    "TIMESTAMP", "DATETIME",
];

fn classify_word(word: &str) -> TokenKind {
    let upper = word.to_ascii_uppercase();
    match upper.as_str() {
        "TRUE" | "FALSE" => TokenKind::Boolean,
        "NULL" => TokenKind::Null,
        _ if KEYWORDS.contains(&upper.as_str()) => TokenKind::Keyword,
        _ => TokenKind::Identifier,
    }
}

/// Whether a `-` at this position starts a numeric literal rather than
/// acting as a binary operator: start of expression, after an operator or
/// keyword, or after `(` / `,`.
fn minus_starts_number(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(t) => match t.kind {
            TokenKind::Operator | TokenKind::Keyword => true,
            TokenKind::Symbol => t.text == "(" || t.text == ",",
            _ => false,
        },
    }
}

/// Tokenize SQL text.
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Whitespace
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // -- comment to end of line
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // String literal with '' escape
        if c == '\'' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        text.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        text.push(ch);
                        i += 1;
                    }
                    None => return Err(Error::Parse("unterminated string literal".into())),
                }
            }
            tokens.push(Token { kind: TokenKind::Str, text });
            continue;
        }

        // Quoted identifier, case preserved
        if c == '"' || c == '`' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        text.push(ch);
                        i += 1;
                    }
                    None => return Err(Error::Parse("unterminated quoted identifier".into())),
                }
            }
            tokens.push(Token { kind: TokenKind::Identifier, text });
            continue;
        }

        // Numeric literal, optionally consumed with a leading minus
        let minus_number = c == '-'
            && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())
            && minus_starts_number(tokens.last());
        if c.is_ascii_digit() || minus_number {
            let mut text = String::new();
            if minus_number {
                text.push('-');
                i += 1;
            }
            let mut seen_dot = false;
            while let Some(&ch) = chars.get(i) {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    i += 1;
                } else if ch == '.' && !seen_dot && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                    seen_dot = true;
                    text.push(ch);
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token { kind: TokenKind::Number, text });
            continue;
        }

        // Word: keyword / identifier / boolean / null
        if c.is_ascii_alphabetic() || c == '_' {
            let mut text = String::new();
            while let Some(&ch) = chars.get(i) {
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    text.push(ch);
                    i += 1;
                } else {
                    break;
                }
            }
            let kind = classify_word(&text);
            tokens.push(Token { kind, text });
            continue;
        }

        // Multi-character operators, greedy
        if let Some(&next) = chars.get(i + 1) {
            let pair: String = [c, next].iter().collect();
            if matches!(pair.as_str(), ">=" | "<=" | "<>" | "!=" | "||") {
                tokens.push(Token { kind: TokenKind::Operator, text: pair });
                i += 2;
                continue;
            }
        }

        // Single-character operators and symbols
        match c {
            '=' | '<' | '>' | '+' | '-' | '/' | '%' => {
                tokens.push(Token { kind: TokenKind::Operator, text: c.to_string() });
                i += 1;
            }
            '(' | ')' | ',' | '*' | '.' | ';' => {
                tokens.push(Token { kind: TokenKind::Symbol, text: c.to_string() });
                i += 1;
            }
            other => {
                return Err(Error::Parse(format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}
