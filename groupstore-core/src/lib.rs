//! # groupstore-core
//!
//! Embedded persistence for a single collection of entities.
//!
//! This library provides:
//! - A [`Store`] that owns one SQLite file under a caller-supplied base
//!   directory and provisions `var/` on first open
//! - Typed CRUD over any [`Entity`], with [`Record`] as the schema-less default
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use groupstore_core::{Record, Store};
//!
//! let store: Store = Store::open("/tmp/app").expect("failed to open store");
//!
//! let group = store.add(Record::new().with("name", "A")).expect("add failed");
//! assert_eq!(store.list().expect("list failed"), vec![group.clone()]);
//!
//! store.delete(group.id.expect("assigned id")).expect("delete failed");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, LoggingConfig, StoreConfig};
pub use db::Store;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
