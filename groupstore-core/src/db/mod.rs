//! Database layer for groupstore
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - The [`Store`] repository over the entity collection

pub mod repo;
pub mod schema;

pub use repo::Store;
