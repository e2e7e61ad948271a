//! Storage engine for ptdb, an embedded file-backed document store.
//!
//! A database is one JSON document held entirely in memory and addressed by
//! dotted paths (`users.alice.age`). Mutations go through a
//! [`RecordTree`] and every mutating call ends in a save that rewrites the
//! whole backing file, gated by a BLAKE3 digest so that unchanged documents
//! never touch disk. Callers can watch paths and are told when the value
//! there differs between two saves.
//!
//! # Key Types
//!
//! - [`Database`] -- the engine handle: load, read/write, array ops, watch, close
//! - [`OpenRegistry`] -- process-local guard against opening a file twice
//! - [`RecordTree`] -- synchronous path operations over the record map
//! - [`DbConfig`] -- sync interval and other tunables, loadable from TOML
//! - [`DbEvent`] -- lifecycle notifications (loaded, saved, closed)
//! - [`WatchEvent`] -- a change reported to a path watcher
//!
//! # Design Rules
//!
//! 1. The document has one owner; handles share it through a lock.
//! 2. A save writes only when the document digest changed.
//! 3. The recorded digest moves only after a successful write.
//! 4. Watch handlers never run while the engine lock is held.
//! 5. A backing file is held by at most one loaded database per registry.

pub mod config;
pub mod database;
pub mod digest;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod tree;
pub mod watch;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{DbConfig, DEFAULT_SYNC_INTERVAL_MS};
pub use database::{Database, DatabaseBuilder};
pub use digest::{ContentHasher, Digest};
pub use error::{DbError, DbResult};
pub use notify::{DbEvent, EventStream};
pub use persistence::{backing_file, FILE_EXTENSION};
pub use registry::OpenRegistry;
pub use tree::RecordTree;
pub use watch::{WatchEvent, WatchHandler};

pub use ptdb_types::{DbPath, Document, DocumentInfo, IntoDbPath, PathError, Records, Value};
