//! Book repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/get/update/remove/search APIs over canonical `books`
//!   storage.
//! - Keep SQL details inside the core persistence boundary.
//! - Return only projected `Book` values from read paths.
//!
//! # Invariants
//! - Write paths validate inputs before any SQL is issued.
//! - At most one record exists per isbn; creating an existing isbn merges
//!   copy counts inside one IMMEDIATE transaction.
//! - Search ordering is `title ASC, identity_key ASC`, so skip/limit pages
//!   partition the match set.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::book::{
    project, validate_isbn, Book, BookPatch, BookValidationError, StoredBook,
};
use crate::search::compile::compile_search;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for book persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(BookValidationError),
    Db(DbError),
    NotFound(String),
    /// The merge update lost its match after the existence check.
    MergeLost(String),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(isbn) => write!(f, "book not found: {isbn}"),
            Self::MergeLost(isbn) => {
                write!(f, "merge for book {isbn} matched no record")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted book data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BookValidationError> for RepoError {
    fn from(value: BookValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Normalized skip/limit window for search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl SearchPage {
    /// Maps signed caller inputs: negative offset means no skip, negative
    /// limit means no limit.
    pub fn from_raw(offset: i64, limit: i64) -> Self {
        Self {
            offset: u64::try_from(offset).ok(),
            limit: u64::try_from(limit).ok(),
        }
    }
}

/// Repository interface for book catalog operations.
pub trait BookRepository {
    /// Inserts a new book, or adds `n_copies` to an existing one.
    fn create_book(&self, book: &Book) -> RepoResult<StoredBook>;
    fn get_book(&self, isbn: &str) -> RepoResult<Book>;
    /// Overwrites present patch fields; returns 1 if anything changed.
    fn update_book(&self, isbn: &str, patch: &BookPatch) -> RepoResult<u64>;
    /// Returns the number of deleted records (0 or 1).
    fn remove_book(&self, isbn: &str) -> RepoResult<u64>;
    fn search_books(&self, text: &str, offset: i64, limit: i64) -> RepoResult<Vec<Book>>;
}

/// SQLite-backed book repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection whose schema was already verified by `try_new`.
    pub(crate) fn for_ready_connection(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads the full persisted record, including storage-only fields.
    pub fn get_stored_book(&self, isbn: &str) -> RepoResult<Option<StoredBook>> {
        validate_isbn(isbn)?;
        load_stored_book(self.conn, isbn)
    }

    fn begin_immediate(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn create_book(&self, book: &Book) -> RepoResult<StoredBook> {
        book.validate()?;

        let tx = self.begin_immediate()?;
        let inserted = tx.execute(
            "INSERT INTO books (identity_key, isbn, title, n_copies)
             VALUES (?1, ?1, ?2, ?3)
             ON CONFLICT (identity_key) DO NOTHING;",
            params![book.isbn.as_str(), book.title.as_str(), book.n_copies],
        )?;

        if inserted == 1 {
            write_authors(&tx, &book.isbn, &book.authors)?;
            tx.commit()?;
            return Ok(StoredBook::from_new(book));
        }

        let merged = tx.execute(
            "UPDATE books
             SET n_copies = n_copies + ?2
             WHERE identity_key = ?1;",
            params![book.isbn.as_str(), book.n_copies],
        )?;
        if merged == 0 {
            return Err(RepoError::MergeLost(book.isbn.clone()));
        }

        let stored = load_stored_book(&tx, &book.isbn)?
            .ok_or_else(|| RepoError::MergeLost(book.isbn.clone()))?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_book(&self, isbn: &str) -> RepoResult<Book> {
        validate_isbn(isbn)?;
        load_stored_book(self.conn, isbn)?
            .map(project)
            .ok_or_else(|| RepoError::NotFound(isbn.to_string()))
    }

    fn update_book(&self, isbn: &str, patch: &BookPatch) -> RepoResult<u64> {
        validate_isbn(isbn)?;
        patch.validate()?;

        let tx = self.begin_immediate()?;
        let current =
            load_stored_book(&tx, isbn)?.ok_or_else(|| RepoError::NotFound(isbn.to_string()))?;

        if !patch.changes(&current) {
            return Ok(0);
        }

        if let Some(title) = patch.title.as_deref() {
            tx.execute(
                "UPDATE books SET title = ?2 WHERE identity_key = ?1;",
                params![isbn, title],
            )?;
        }
        if let Some(n_copies) = patch.n_copies {
            tx.execute(
                "UPDATE books SET n_copies = ?2 WHERE identity_key = ?1;",
                params![isbn, n_copies],
            )?;
        }
        if let Some(authors) = patch.authors.as_deref() {
            tx.execute("DELETE FROM book_authors WHERE identity_key = ?1;", [isbn])?;
            write_authors(&tx, isbn, authors)?;
        }

        tx.commit()?;
        Ok(1)
    }

    fn remove_book(&self, isbn: &str) -> RepoResult<u64> {
        validate_isbn(isbn)?;
        let deleted = self
            .conn
            .execute("DELETE FROM books WHERE identity_key = ?1;", [isbn])?;
        Ok(deleted as u64)
    }

    fn search_books(&self, text: &str, offset: i64, limit: i64) -> RepoResult<Vec<Book>> {
        let page = SearchPage::from_raw(offset, limit);
        let (filter_sql, mut bind_values) = compile_search(text).to_sql();

        let mut sql = format!(
            "SELECT identity_key
             FROM books
             WHERE {filter_sql}
             ORDER BY title ASC, identity_key ASC"
        );

        // SQLite applies OFFSET before LIMIT; LIMIT -1 means unbounded.
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(page.limit.map_or(-1, page_bound)));
        if let Some(offset) = page.offset {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(page_bound(offset)));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let keys = {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut keys = Vec::new();
            while let Some(row) = rows.next()? {
                keys.push(row.get::<_, String>(0)?);
            }
            keys
        };

        let mut books = Vec::with_capacity(keys.len());
        for key in keys {
            let stored = load_stored_book(&tx, &key)?.ok_or_else(|| {
                RepoError::InvalidData(format!("book {key} vanished during search"))
            })?;
            books.push(project(stored));
        }
        tx.commit()?;

        Ok(books)
    }
}

fn page_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn write_authors(conn: &Connection, isbn: &str, authors: &[String]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO book_authors (identity_key, position, name) VALUES (?1, ?2, ?3);",
    )?;
    for (position, name) in authors.iter().enumerate() {
        stmt.execute(params![isbn, position as i64, name.as_str()])?;
    }
    Ok(())
}

fn load_stored_book(conn: &Connection, isbn: &str) -> RepoResult<Option<StoredBook>> {
    let head = conn
        .query_row(
            "SELECT identity_key, isbn, title, n_copies
             FROM books
             WHERE identity_key = ?1;",
            [isbn],
            |row| {
                Ok((
                    row.get::<_, String>("identity_key")?,
                    row.get::<_, String>("isbn")?,
                    row.get::<_, String>("title")?,
                    row.get::<_, i64>("n_copies")?,
                ))
            },
        )
        .optional()?;

    let Some((identity_key, stored_isbn, title, n_copies)) = head else {
        return Ok(None);
    };

    if identity_key != stored_isbn {
        return Err(RepoError::InvalidData(format!(
            "identity key `{identity_key}` differs from isbn `{stored_isbn}`"
        )));
    }
    let n_copies = u32::try_from(n_copies).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid n_copies value `{n_copies}` in books.n_copies"
        ))
    })?;

    Ok(Some(StoredBook {
        authors: load_column(
            conn,
            "SELECT name FROM book_authors WHERE identity_key = ?1 ORDER BY position ASC;",
            &identity_key,
        )?,
        patrons: load_column(
            conn,
            "SELECT patron_id FROM book_patrons WHERE identity_key = ?1 ORDER BY patron_id ASC;",
            &identity_key,
        )?,
        identity_key,
        isbn: stored_isbn,
        title,
        n_copies,
    }))
}

fn load_column(conn: &Connection, sql: &str, identity_key: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query([identity_key])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row.get(0)?);
    }
    Ok(values)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        ("books", &["identity_key", "isbn", "title", "n_copies"]),
        ("book_authors", &["identity_key", "position", "name"]),
        ("book_patrons", &["identity_key", "patron_id"]),
    ];
    for &(table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns.iter() {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
