//! Free-text search compilation for the book catalog.
//!
//! # Responsibility
//! - Turn search text into typed filter expressions.
//! - Keep rendering of filters to SQL inside core.

pub mod compile;
pub mod filter;
