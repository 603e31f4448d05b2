//! Catalog domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the book repository.
//! - Keep persisted-only fields separate from the caller-facing entity.
//!
//! # Invariants
//! - Every catalog entry is identified by its `isbn`.

pub mod book;
