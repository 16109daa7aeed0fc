#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-sql** – SQL front end for the Quarry engine.
//!
//! Three layers, all pure: the tokenizer ([`token`]), the query plan
//! algebra ([`plan`]) plus parsed statement shapes ([`stmt`]), and the
//! recursive-descent parsers ([`parse`]). Nothing here touches state; the
//! gates wrapping these functions live in the engine crate, so parsing
//! stays a plain tokens-in/structure-out transform that is trivial to test.

pub mod parse;
pub mod plan;
pub mod stmt;
pub mod token;

pub use parse::{classify, parse_select, Route};
pub use token::{tokenize, Token, TokenKind};

use std::collections::BTreeSet;

/// Collect the table names a token slice references: every identifier that
/// follows a `FROM`, `JOIN` or `INTO` keyword. Used when a ReadSet has to
/// cover subquery tokens without parsing them.
pub fn tables_in_tokens(tokens: &[Token]) -> Vec<String> {
    let mut tables = BTreeSet::new();
    for (i, t) in tokens.iter().enumerate() {
        if t.is_kw("FROM") || t.is_kw("JOIN") || t.is_kw("INTO") {
            if let Some(next) = tokens.get(i + 1) {
                if matches!(next.kind, TokenKind::Identifier) {
                    tables.insert(next.text.clone());
                }
            }
        }
    }
    tables.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tables_after_from_join_into() {
        let toks = tokenize("SELECT a FROM t1 JOIN t2 ON t1.x = t2.y WHERE b IN (SELECT c FROM t3)").unwrap();
        assert_eq!(tables_in_tokens(&toks), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn derived_tables_contribute_their_inner_tables() {
        let toks = tokenize("SELECT a FROM (SELECT b FROM inner_t) d").unwrap();
        assert_eq!(tables_in_tokens(&toks), vec!["inner_t"]);
    }
}
