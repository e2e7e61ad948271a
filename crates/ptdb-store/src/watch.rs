//! Path-level change detection.
//!
//! The document has no diffing of its own. Instead every watched path keeps
//! the digest and value it held at the last evaluation, and after each save
//! the registry re-reads those paths and reports the ones whose digest moved.
//! Several mutations between two saves therefore coalesce into one event.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ptdb_types::{DbPath, Records, Value};
use tracing::{debug, warn};

use crate::digest::{ContentHasher, Digest};
use crate::error::{DbError, DbResult};
use crate::tree::read_value;

/// Callback invoked with each change at a watched path.
pub type WatchHandler = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

/// A change observed at a watched path.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchEvent {
    /// The watched path.
    pub path: DbPath,
    /// The value now at the path; `None` if absent.
    pub value: Option<Value>,
    /// The value at the previous evaluation; `None` if absent or never seen.
    pub previous: Option<Value>,
}

/// An event together with the handlers that should receive it.
pub struct Dispatch {
    pub handlers: Vec<WatchHandler>,
    pub event: WatchEvent,
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("handlers", &self.handlers.len())
            .field("event", &self.event)
            .finish()
    }
}

struct WatchEntry {
    path: DbPath,
    handlers: Vec<WatchHandler>,
    last_digest: Option<Digest>,
    last_value: Option<Value>,
}

impl WatchEntry {
    fn snapshot(&mut self, records: &Records) -> DbResult<bool> {
        let value = observe(records, &self.path);
        let digest = value_digest(value.as_ref())?;
        if self.last_digest == Some(digest) {
            return Ok(false);
        }
        self.last_digest = Some(digest);
        self.last_value = value;
        Ok(true)
    }
}

/// Subscriptions keyed by path, each with its last observed state.
#[derive(Default)]
pub struct WatchRegistry {
    entries: BTreeMap<String, WatchEntry>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `path`.
    ///
    /// The first handler for a path creates its entry. When `current` is
    /// given (the database is loaded) the entry starts from the value there
    /// now, so the first event reports it as `previous`.
    pub fn add(
        &mut self,
        path: DbPath,
        handler: WatchHandler,
        current: Option<&Records>,
    ) -> DbResult<()> {
        let key = path.to_string();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.handlers.push(handler);
            return Ok(());
        }

        let mut entry = WatchEntry {
            path,
            handlers: vec![handler],
            last_digest: None,
            last_value: None,
        };
        if let Some(records) = current {
            entry.snapshot(records)?;
        }
        debug!(path = %key, "watch entry created");
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Drop every handler for `path`. Returns whether an entry existed.
    pub fn remove(&mut self, path: &DbPath) -> bool {
        self.entries.remove(&path.to_string()).is_some()
    }

    /// Re-snapshot every entry without reporting anything.
    pub fn prime(&mut self, records: &Records) -> DbResult<()> {
        for entry in self.entries.values_mut() {
            entry.snapshot(records)?;
        }
        Ok(())
    }

    /// Compare every watched path against its last snapshot and return one
    /// dispatch per path that changed.
    pub fn evaluate(&mut self, records: &Records) -> DbResult<Vec<Dispatch>> {
        let mut dispatches = Vec::new();
        for entry in self.entries.values_mut() {
            let previous = entry.last_value.clone();
            if !entry.snapshot(records)? {
                continue;
            }
            debug!(path = %entry.path, handlers = entry.handlers.len(), "watched value changed");
            dispatches.push(Dispatch {
                handlers: entry.handlers.clone(),
                event: WatchEvent {
                    path: entry.path.clone(),
                    value: entry.last_value.clone(),
                    previous,
                },
            });
        }
        Ok(dispatches)
    }

    /// Returns `true` if `path` has at least one handler.
    pub fn is_watched(&self, path: &DbPath) -> bool {
        self.entries.contains_key(&path.to_string())
    }

    /// Number of handlers registered under `path`.
    pub fn handler_count(&self, path: &DbPath) -> usize {
        self.entries
            .get(&path.to_string())
            .map_or(0, |entry| entry.handlers.len())
    }

    /// Number of watched paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read a watched value. A path that can no longer be walked (an ancestor
/// became a scalar) counts as absent.
fn observe(records: &Records, path: &DbPath) -> Option<Value> {
    match read_value(records, path) {
        Ok(value) => value,
        Err(DbError::NotTraversable { segment, .. }) => {
            debug!(path = %path, segment = %segment, "watched path not traversable");
            None
        }
        Err(e) => {
            warn!(path = %path, error = %e, "watched path could not be read");
            None
        }
    }
}

/// Digest of an observed value. Absence hashes differently from `null`.
fn value_digest(value: Option<&Value>) -> DbResult<Digest> {
    match value {
        Some(value) => ContentHasher::WATCH.hash_json(value),
        None => Ok(ContentHasher::WATCH.hash(b"\0absent")),
    }
}
