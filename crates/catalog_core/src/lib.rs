//! Persistence core for the library book catalog.
//! This crate is the single source of truth for catalog invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use db::{open_store, open_store_in_memory, CatalogStore, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::book::{project, Book, BookPatch, BookValidationError, StoredBook};
pub use repo::book_repo::{
    BookRepository, RepoError, RepoResult, SearchPage, SqliteBookRepository,
};
pub use search::compile::{compile_search, search_tokens};
pub use search::filter::{BookField, FilterExpr};
pub use service::catalog_service::CatalogService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
