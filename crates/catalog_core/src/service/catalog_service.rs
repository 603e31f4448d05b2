//! Catalog use-case service.
//!
//! # Responsibility
//! - Hold the long-lived store handle and release it exactly once.
//! - Provide stable create/get/update/remove/search entry points for
//!   transport callers.
//! - Emit one metadata-only log event per operation.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Each operation holds the store lock for its whole duration, so one
//!   service may be shared across threads.
//! - Titles, authors and patron ids are never logged.

use crate::db::{open_store, CatalogStore, DbResult};
use crate::model::book::{Book, BookPatch, StoredBook};
use crate::repo::book_repo::{BookRepository, RepoResult, SqliteBookRepository};
use log::{debug, warn};
use std::time::Instant;

/// Catalog API surface backed by one owned store handle.
///
/// `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct CatalogService {
    store: CatalogStore,
}

impl CatalogService {
    /// Wraps an opened store after verifying its schema.
    pub fn new(store: CatalogStore) -> RepoResult<Self> {
        {
            let conn = store.lock()?;
            SqliteBookRepository::try_new(&conn)?;
        }
        Ok(Self { store })
    }

    /// Opens the store at `address` and wraps it.
    pub fn open(address: &str) -> RepoResult<Self> {
        Self::new(open_store(address)?)
    }

    /// Creates a book, merging copy counts into an existing record.
    pub fn create(&self, book: &Book) -> RepoResult<StoredBook> {
        let started_at = Instant::now();
        let result = self.with_repo(|repo| repo.create_book(book));
        match &result {
            Ok(stored) => debug!(
                "event=book_create module=catalog status=ok n_copies={} patrons={} duration_ms={}",
                stored.n_copies,
                stored.patrons.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("book_create", started_at, err),
        }
        result
    }

    pub fn get(&self, isbn: &str) -> RepoResult<Book> {
        let started_at = Instant::now();
        let result = self.with_repo(|repo| repo.get_book(isbn));
        match &result {
            Ok(_) => log_success("book_get", started_at),
            Err(err) => log_failure("book_get", started_at, err),
        }
        result
    }

    /// Applies a partial update; returns the modified count (0 or 1).
    pub fn update(&self, isbn: &str, patch: &BookPatch) -> RepoResult<u64> {
        let started_at = Instant::now();
        let result = self.with_repo(|repo| repo.update_book(isbn, patch));
        match &result {
            Ok(modified) => debug!(
                "event=book_update module=catalog status=ok modified={} duration_ms={}",
                modified,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("book_update", started_at, err),
        }
        result
    }

    /// Deletes a book; returns the deleted count (0 or 1).
    pub fn remove(&self, isbn: &str) -> RepoResult<u64> {
        let started_at = Instant::now();
        let result = self.with_repo(|repo| repo.remove_book(isbn));
        match &result {
            Ok(deleted) => debug!(
                "event=book_remove module=catalog status=ok deleted={} duration_ms={}",
                deleted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("book_remove", started_at, err),
        }
        result
    }

    /// Searches title/author text; negative `offset`/`limit` are unbounded.
    pub fn search(&self, text: &str, offset: i64, limit: i64) -> RepoResult<Vec<Book>> {
        let started_at = Instant::now();
        let result = self.with_repo(|repo| repo.search_books(text, offset, limit));
        match &result {
            Ok(books) => debug!(
                "event=book_search module=catalog status=ok offset={} limit={} hits={} duration_ms={}",
                offset,
                limit,
                books.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("book_search", started_at, err),
        }
        result
    }

    /// Releases the store handle. The service cannot be used afterwards.
    pub fn close(self) -> DbResult<()> {
        self.store.close()
    }

    fn with_repo<T>(
        &self,
        op: impl FnOnce(&SqliteBookRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let conn = self.store.lock()?;
        op(&SqliteBookRepository::for_ready_connection(&conn))
    }
}

fn log_success(event: &str, started_at: Instant) {
    debug!(
        "event={} module=catalog status=ok duration_ms={}",
        event,
        started_at.elapsed().as_millis()
    );
}

fn log_failure(event: &str, started_at: Instant, err: &dyn std::error::Error) {
    warn!(
        "event={} module=catalog status=error duration_ms={} error={}",
        event,
        started_at.elapsed().as_millis(),
        err
    );
}
