//! Foundation types for ptdb, an embedded file-backed document store.
//!
//! This crate holds the pure, I/O-free pieces every other ptdb crate builds
//! on. The storage engine itself lives in `ptdb-store`.
//!
//! # Key Types
//!
//! - [`DbPath`] -- a parsed dotted path (`a.b.c`) or the root sentinel (`.`)
//! - [`Document`] -- the full persisted state: records plus metadata
//! - [`DocumentInfo`] -- creation and modification timestamps

pub mod document;
pub mod error;
pub mod path;

pub use document::{now_ms, Document, DocumentInfo, Records};
pub use error::{PathError, PathResult};
pub use path::{DbPath, IntoDbPath, ROOT};

/// Re-exported so downstream crates agree on one JSON value type.
pub use serde_json::Value;
