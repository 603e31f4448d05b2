//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the catalog.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate inputs before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod book_repo;
