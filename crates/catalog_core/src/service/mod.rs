//! Core use-case services.
//!
//! # Responsibility
//! - Own the store handle and expose the catalog API surface.
//! - Keep transport layers decoupled from storage details.

pub mod catalog_service;
