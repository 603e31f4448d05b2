//! Free-text search compilation.
//!
//! # Responsibility
//! - Tokenize user search text.
//! - Build the title/author filter the book repository executes.
//!
//! # Invariants
//! - Tokens are maximal runs of two or more word characters.
//! - Every token must match (AND); each token may match title or any author (OR).
//! - Text with no tokens compiles to a filter that matches every record.

use super::filter::{BookField, FilterExpr};
use once_cell::sync::Lazy;
use regex::Regex;

static SEARCH_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w{2,}").expect("valid search token regex"));

/// Extracts search tokens from `text`, in order of appearance.
pub fn search_tokens(text: &str) -> Vec<&str> {
    SEARCH_TOKEN_RE
        .find_iter(text)
        .map(|token| token.as_str())
        .collect()
}

/// Compiles free text into a title/author filter.
///
/// Malformed text never fails; it only yields fewer tokens and thus a
/// broader filter.
pub fn compile_search(text: &str) -> FilterExpr {
    let clauses = search_tokens(text)
        .into_iter()
        .map(|token| {
            FilterExpr::Any(vec![
                FilterExpr::contains(BookField::Title, token),
                FilterExpr::contains(BookField::Authors, token),
            ])
        })
        .collect();
    FilterExpr::All(clauses)
}
