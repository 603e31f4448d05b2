//! Book domain model.
//!
//! # Responsibility
//! - Define the externally visible `Book` entity and its persisted superset.
//! - Project persisted records into caller-facing entities.
//!
//! # Invariants
//! - `isbn` is the identity key; `StoredBook::identity_key == isbn`.
//! - `patrons` is storage-internal and never part of `Book`.
//! - `n_copies` is non-negative by construction.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller-facing catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Globally unique identity key.
    pub isbn: String,
    pub title: String,
    /// Ordered author names.
    pub authors: Vec<String>,
    /// Total copies owned by the library.
    pub n_copies: u32,
}

/// Persisted catalog entry, as stored under its identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBook {
    /// Storage primary key; always equal to `isbn`.
    pub identity_key: String,
    pub isbn: String,
    pub title: String,
    pub authors: Vec<String>,
    pub n_copies: u32,
    /// Patrons currently holding a checked-out copy.
    ///
    /// Maintained by the checkout subsystem through the same identity key.
    pub patrons: Vec<String>,
}

/// Partial update for an existing book. Absent fields are left unchanged.
///
/// The identity key is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_copies: Option<u32>,
}

/// Local input errors rejected before any storage interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookValidationError {
    EmptyIsbn,
    EmptyPatch,
}

impl Display for BookValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIsbn => write!(f, "isbn must not be empty"),
            Self::EmptyPatch => write!(f, "patch must set at least one field"),
        }
    }
}

impl Error for BookValidationError {}

impl Book {
    pub fn new(
        isbn: impl Into<String>,
        title: impl Into<String>,
        authors: impl IntoIterator<Item = impl Into<String>>,
        n_copies: u32,
    ) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            authors: authors.into_iter().map(Into::into).collect(),
            n_copies,
        }
    }

    /// Checks caller-controlled invariants before persistence.
    pub fn validate(&self) -> Result<(), BookValidationError> {
        validate_isbn(&self.isbn)
    }
}

impl StoredBook {
    /// Builds the record persisted for a book seen for the first time.
    pub fn from_new(book: &Book) -> Self {
        Self {
            identity_key: book.isbn.clone(),
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            authors: book.authors.clone(),
            n_copies: book.n_copies,
            patrons: Vec::new(),
        }
    }
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.authors.is_none() && self.n_copies.is_none()
    }

    pub fn validate(&self) -> Result<(), BookValidationError> {
        if self.is_empty() {
            return Err(BookValidationError::EmptyPatch);
        }
        Ok(())
    }

    /// Returns whether applying this patch would change `current`.
    pub fn changes(&self, current: &StoredBook) -> bool {
        self.title.as_ref().is_some_and(|title| *title != current.title)
            || self
                .authors
                .as_ref()
                .is_some_and(|authors| *authors != current.authors)
            || self.n_copies.is_some_and(|n| n != current.n_copies)
    }
}

/// Rejects blank identity keys.
pub fn validate_isbn(isbn: &str) -> Result<(), BookValidationError> {
    if isbn.trim().is_empty() {
        return Err(BookValidationError::EmptyIsbn);
    }
    Ok(())
}

/// Strips storage-internal fields from a persisted record.
pub fn project(stored: StoredBook) -> Book {
    Book {
        isbn: stored.isbn,
        title: stored.title,
        authors: stored.authors,
        n_copies: stored.n_copies,
    }
}

impl From<StoredBook> for Book {
    fn from(value: StoredBook) -> Self {
        project(value)
    }
}
