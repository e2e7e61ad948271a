use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use ptdb_types::{Document, DocumentInfo, IntoDbPath, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::digest::{ContentHasher, Digest};
use crate::error::{DbError, DbResult};
use crate::notify::{DbEvent, EventBus, EventStream, Notifier};
use crate::persistence;
use crate::registry::OpenRegistry;
use crate::scheduler::SyncScheduler;
use crate::tree::{self, RecordTree};
use crate::watch::{WatchEvent, WatchRegistry};

/// Registry used by databases built without an explicit one.
fn process_registry() -> &'static OpenRegistry {
    static REGISTRY: OnceLock<OpenRegistry> = OnceLock::new();
    REGISTRY.get_or_init(OpenRegistry::new)
}

/// Handle to one file-backed document database.
///
/// The whole document lives in memory while loaded. Every mutating call
/// saves afterwards, a background timer saves every
/// [`sync_interval`](DbConfig::sync_interval), and a save only touches disk
/// when the document digest changed since the last one.
///
/// Handles are cheap to clone and all clones share one database.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> ptdb_store::DbResult<()> {
/// use ptdb_store::{Database, OpenRegistry};
/// use serde_json::json;
///
/// let registry = OpenRegistry::new();
/// let db = Database::builder("data/app").registry(registry).build()?;
/// db.load().await?;
/// db.write("users.alice.age", json!(30)).await?;
/// assert_eq!(db.read("users.alice.age").await?, Some(json!(30)));
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

struct Shared {
    path: PathBuf,
    file: PathBuf,
    config: DbConfig,
    registry: OpenRegistry,
    events: EventBus,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    doc: Option<Document>,
    digest: Option<Digest>,
    watches: WatchRegistry,
    scheduler: Option<SyncScheduler>,
    notifier: Option<Notifier>,
    closed: bool,
}

impl Database {
    /// Create an unloaded database for `path` (the backing file is
    /// `<path>.ptsb`).
    pub fn new(path: impl AsRef<Path>, registry: OpenRegistry, config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = persistence::backing_file(&path);
        Ok(Self {
            shared: Arc::new(Shared {
                path,
                file,
                config,
                registry,
                events: EventBus::new(),
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Start configuring a database for `path`.
    pub fn builder(path: impl AsRef<Path>) -> DatabaseBuilder {
        DatabaseBuilder::new(path)
    }

    /// The database path as given, without the extension.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// The backing file.
    pub fn file_path(&self) -> &Path {
        &self.shared.file
    }

    pub fn config(&self) -> &DbConfig {
        &self.shared.config
    }

    /// Receive lifecycle events emitted after this call.
    pub fn subscribe(&self) -> EventStream {
        self.shared.events.subscribe()
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Claim the backing file and read it into memory.
    ///
    /// A missing or empty file starts a fresh document. Content that does
    /// not decode fails with [`DbError::Corrupted`]; nothing is replaced.
    pub async fn load(&self) -> DbResult<()> {
        let mut state = self.shared.state.lock().await;
        let file = &self.shared.file;
        self.shared.registry.acquire(file)?;

        let prepared = persistence::read_document(file).await.and_then(|doc| {
            let doc = doc.unwrap_or_default();
            let digest = document_digest(&doc)?;
            state.watches.prime(&doc.records)?;
            Ok((doc, digest))
        });
        let (doc, digest) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.shared.registry.release(file);
                return Err(e);
            }
        };

        let record_count = doc.records.len();
        state.doc = Some(doc);
        state.digest = Some(digest);
        state.closed = false;
        state.notifier = Some(Notifier::spawn());

        self.save_locked(&mut state).await?;
        state.scheduler = Some(self.start_sync());
        drop(state);

        info!(path = %file.display(), records = record_count, "database loaded");
        self.shared.events.emit(DbEvent::Loaded);
        Ok(())
    }

    /// Write the document to disk if it changed since the last save.
    ///
    /// Returns `true` when the file was written and `false` when the save
    /// was skipped because nothing changed.
    pub async fn save(&self) -> DbResult<bool> {
        let mut state = self.shared.state.lock().await;
        self.save_locked(&mut state).await
    }

    /// Flush, stop the timer, drop the document and release the backing
    /// file. Queued watch notifications are delivered before this returns.
    pub async fn close(&self) -> DbResult<()> {
        let notifier = {
            let mut state = self.shared.state.lock().await;
            self.save_locked(&mut state).await?;

            state.doc = None;
            state.digest = None;
            if let Some(mut scheduler) = state.scheduler.take() {
                scheduler.stop();
            }
            self.shared.registry.release(&self.shared.file);
            state.closed = true;
            state.notifier.take()
        };

        if let Some(notifier) = notifier {
            if let Err(e) = notifier.finish().await {
                debug!(error = %e, "watch dispatcher ended abnormally");
            }
        }

        info!(path = %self.shared.file.display(), "database closed");
        self.shared.events.emit(DbEvent::Closed);
        Ok(())
    }

    /// Returns `true` while a document is held in memory.
    pub async fn is_loaded(&self) -> bool {
        self.shared.state.lock().await.doc.is_some()
    }

    /// Returns `true` after [`close`](Self::close) until the next load.
    pub async fn is_closed(&self) -> bool {
        self.shared.state.lock().await.closed
    }

    /// Creation and modification timestamps of the loaded document.
    pub async fn info(&self) -> DbResult<DocumentInfo> {
        let state = self.shared.state.lock().await;
        state.doc.as_ref().map(|doc| doc.info).ok_or(DbError::NotLoaded)
    }

    /// Digest recorded by the last load or save; `None` when not loaded.
    pub async fn digest(&self) -> Option<Digest> {
        self.shared.state.lock().await.digest
    }

    // ---------------------------------------------------------------
    // Reads and mutations
    // ---------------------------------------------------------------

    /// The value at `path`, or `None` if nothing is there. `"."` returns
    /// every record as one object.
    pub async fn read(&self, path: impl IntoDbPath) -> DbResult<Option<Value>> {
        let path = path.into_db_path()?;
        let state = self.shared.state.lock().await;
        let doc = state.doc.as_ref().ok_or(DbError::NotLoaded)?;
        tree::read_value(&doc.records, &path)
    }

    /// Store `value` at `path`, creating intermediate objects, then save.
    pub async fn write(&self, path: impl IntoDbPath, value: Value) -> DbResult<Value> {
        let path = path.into_db_path()?;
        self.batch(|tree| tree.set(&path, value)).await
    }

    /// Append to the array at `path` (created if missing), then save.
    pub async fn push(&self, path: impl IntoDbPath, value: Value) -> DbResult<Vec<Value>> {
        let path = path.into_db_path()?;
        self.batch(|tree| tree.push(&path, value)).await
    }

    /// Prepend to the array at `path` (created if missing), then save.
    pub async fn unshift(&self, path: impl IntoDbPath, value: Value) -> DbResult<Vec<Value>> {
        let path = path.into_db_path()?;
        self.batch(|tree| tree.unshift(&path, value)).await
    }

    /// Remove the last element of the array at `path`, then save.
    pub async fn pop(&self, path: impl IntoDbPath) -> DbResult<Option<Value>> {
        let path = path.into_db_path()?;
        self.batch(|tree| tree.pop(&path)).await
    }

    /// Remove the first element of the array at `path`, then save.
    pub async fn shift(&self, path: impl IntoDbPath) -> DbResult<Option<Value>> {
        let path = path.into_db_path()?;
        self.batch(|tree| tree.shift(&path)).await
    }

    /// Delete the value at `path` (`"."` clears everything), then save.
    /// Returns whether anything was removed.
    pub async fn unset(&self, path: impl IntoDbPath) -> DbResult<bool> {
        let path = path.into_db_path()?;
        self.batch(|tree| tree.unset(&path)).await
    }

    /// Apply several mutations and save once.
    ///
    /// Watchers see the combined effect as a single change. If `f` fails,
    /// nothing is saved, but mutations it already made stay in memory and
    /// go out with the next save.
    pub async fn batch<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut RecordTree<'_>) -> DbResult<T>,
    {
        let mut state = self.shared.state.lock().await;
        let doc = state.doc.as_mut().ok_or(DbError::NotLoaded)?;
        let result = f(&mut RecordTree::new(&mut doc.records))?;
        self.save_locked(&mut state).await?;
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Watches
    // ---------------------------------------------------------------

    /// Call `handler` whenever a save changes the value at `path`.
    ///
    /// Handlers run on a background task, never inside the save that
    /// triggered them.
    pub async fn watch<F>(&self, path: impl IntoDbPath, handler: F) -> DbResult<()>
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        let path = path.into_db_path()?;
        let mut state = self.shared.state.lock().await;
        let State { doc, watches, .. } = &mut *state;
        watches.add(path, Arc::new(handler), doc.as_ref().map(|doc| &doc.records))
    }

    /// Remove every handler for `path`. Returns whether any were registered.
    pub async fn unwatch(&self, path: impl IntoDbPath) -> DbResult<bool> {
        let path = path.into_db_path()?;
        let removed = self.shared.state.lock().await.watches.remove(&path);
        if removed {
            debug!(path = %path, "watch removed");
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    async fn save_locked(&self, state: &mut State) -> DbResult<bool> {
        let doc = state.doc.as_mut().ok_or(DbError::NotLoaded)?;
        if state.digest == Some(document_digest(doc)?) {
            debug!(path = %self.shared.file.display(), "no changes, save skipped");
            return Ok(false);
        }

        doc.info.touch();
        let bytes = persistence::encode(doc)?;
        let digest = ContentHasher::DOCUMENT.hash(&bytes);

        // The recorded digest only moves once the bytes are on disk, so a
        // failed write is retried by the next save.
        persistence::write_document(&self.shared.file, &bytes).await?;
        state.digest = Some(digest);
        debug!(path = %self.shared.file.display(), %digest, "document saved");
        self.shared.events.emit(DbEvent::Saved { digest });

        let dispatches = state.watches.evaluate(&doc.records)?;
        if !dispatches.is_empty() {
            if let Some(notifier) = &state.notifier {
                notifier.send(dispatches);
            }
        }
        Ok(true)
    }

    fn start_sync(&self) -> SyncScheduler {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        SyncScheduler::start(self.shared.config.sync_interval(), move || {
            let weak = weak.clone();
            async move {
                let Some(shared) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                let db = Database { shared };
                match db.save().await {
                    Ok(_) => ControlFlow::Continue(()),
                    Err(DbError::NotLoaded) => ControlFlow::Break(()),
                    Err(e) => {
                        warn!(path = %db.file_path().display(), error = %e, "scheduled save failed");
                        ControlFlow::Continue(())
                    }
                }
            }
        })
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("file", &self.shared.file)
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(doc) = state.doc.take() {
            let dirty = document_digest(&doc).ok() != state.digest;
            if dirty {
                warn!(path = %self.file.display(), "database dropped with unsaved changes");
            }
            self.registry.release(&self.file);
        }
    }
}

fn document_digest(doc: &Document) -> DbResult<Digest> {
    ContentHasher::DOCUMENT.hash_json(doc)
}

/// Builder for [`Database`].
///
/// Without an explicit [`registry`](Self::registry) the database shares one
/// process-wide [`OpenRegistry`] with every other builder-made database.
#[derive(Debug)]
pub struct DatabaseBuilder {
    path: PathBuf,
    registry: Option<OpenRegistry>,
    config: DbConfig,
}

impl DatabaseBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            registry: None,
            config: DbConfig::default(),
        }
    }

    /// Share `registry` for the single-open guard.
    pub fn registry(mut self, registry: OpenRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the period of the background save.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn build(self) -> DbResult<Database> {
        let registry = self
            .registry
            .unwrap_or_else(|| process_registry().clone());
        Database::new(self.path, registry, self.config)
    }
}
