//! Typed filter expressions over catalog records.
//!
//! # Responsibility
//! - Represent search filters as a tagged tree instead of ad-hoc SQL strings.
//! - Render filters into SQLite boolean expressions with bound parameters.
//! - Evaluate filters in memory with identical semantics.
//!
//! # Invariants
//! - Needles are case-folded at construction and always bound, never
//!   interpolated into SQL text.
//! - `All([])` matches every record; `Any([])` matches none.

use crate::db::{fold_case, FOLD_CASE_FN};
use crate::model::book::Book;
use rusqlite::types::Value;

/// Record fields a filter can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookField {
    Title,
    /// Matches when at least one author matches.
    Authors,
}

/// Boolean filter over books.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    /// Case-insensitive substring test.
    Contains { field: BookField, needle: String },
    /// Conjunction; empty is universally true.
    All(Vec<FilterExpr>),
    /// Disjunction; empty is universally false.
    Any(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn contains(field: BookField, needle: &str) -> Self {
        Self::Contains {
            field,
            needle: fold_case(needle),
        }
    }

    /// Filter that accepts every record.
    pub fn match_all() -> Self {
        Self::All(Vec::new())
    }

    /// Evaluates the filter against a projected book, agreeing with the SQL
    /// rendering of the same filter.
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Self::Contains { field, needle } => match field {
                BookField::Title => fold_case(&book.title).contains(needle.as_str()),
                BookField::Authors => book
                    .authors
                    .iter()
                    .any(|author| fold_case(author).contains(needle.as_str())),
            },
            Self::All(children) => children.iter().all(|child| child.matches(book)),
            Self::Any(children) => children.iter().any(|child| child.matches(book)),
        }
    }

    /// Renders a boolean SQL expression over the `books` table.
    ///
    /// Returns the expression text and its positional (`?`) bind values in
    /// order of appearance.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut bind_values = Vec::new();
        self.write_sql(&mut sql, &mut bind_values);
        (sql, bind_values)
    }

    fn write_sql(&self, sql: &mut String, bind_values: &mut Vec<Value>) {
        match self {
            Self::Contains { field, needle } => {
                match field {
                    BookField::Title => {
                        sql.push_str(&format!("instr({FOLD_CASE_FN}(books.title), ?) > 0"));
                    }
                    BookField::Authors => {
                        sql.push_str(&format!(
                            "EXISTS (
                                SELECT 1
                                FROM book_authors ba
                                WHERE ba.identity_key = books.identity_key
                                  AND instr({FOLD_CASE_FN}(ba.name), ?) > 0
                            )"
                        ));
                    }
                }
                bind_values.push(Value::Text(needle.clone()));
            }
            Self::All(children) => write_joined(children, " AND ", "1 = 1", sql, bind_values),
            Self::Any(children) => write_joined(children, " OR ", "0 = 1", sql, bind_values),
        }
    }
}

fn write_joined(
    children: &[FilterExpr],
    separator: &str,
    empty: &str,
    sql: &mut String,
    bind_values: &mut Vec<Value>,
) {
    if children.is_empty() {
        sql.push_str(empty);
        return;
    }

    sql.push('(');
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        child.write_sql(sql, bind_values);
    }
    sql.push(')');
}
