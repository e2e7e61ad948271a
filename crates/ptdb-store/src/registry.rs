//! Process-local guard against opening one backing file twice.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{DbError, DbResult};

/// Table of backing files currently held by a loaded [`Database`](crate::Database).
///
/// Create one per process (or per group of databases that must not overlap)
/// and hand clones to every database. Clones share the same table. The guard
/// is advisory and only covers handles that share the registry; it does not
/// lock the file against other processes.
#[derive(Clone, Debug, Default)]
pub struct OpenRegistry {
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl OpenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `file`. Fails with [`DbError::AlreadyOpen`] if it is held.
    pub fn acquire(&self, file: &Path) -> DbResult<()> {
        let key = registry_key(file);
        let mut held = self.lock();
        if !held.insert(key.clone()) {
            return Err(DbError::AlreadyOpen { path: key });
        }
        debug!(path = %key.display(), "registry entry acquired");
        Ok(())
    }

    /// Give `file` back. Returns whether it was held.
    pub fn release(&self, file: &Path) -> bool {
        let key = registry_key(file);
        let released = self.lock().remove(&key);
        if released {
            debug!(path = %key.display(), "registry entry released");
        }
        released
    }

    /// Returns `true` if `file` is currently held.
    pub fn is_held(&self, file: &Path) -> bool {
        self.lock().contains(&registry_key(file))
    }

    /// Number of files currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The set is updated with single insert/remove calls, so a panic while
    // the lock is held cannot leave it half-modified.
    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolved form of `file`, so `db.ptsb`, `./db.ptsb` and `sub/../db.ptsb`
/// collide. The file itself may not exist yet, so only its parent directory
/// is canonicalized.
fn registry_key(file: &Path) -> PathBuf {
    let resolved = match (file.parent(), file.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            std::fs::canonicalize(parent).map(|dir| dir.join(name)).ok()
        }
        _ => None,
    };
    resolved
        .or_else(|| std::path::absolute(file).ok())
        .unwrap_or_else(|| file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release() {
        let registry = OpenRegistry::new();
        let file = Path::new("/tmp/ptdb-registry/a.ptsb");

        registry.acquire(file).unwrap();
        assert!(registry.is_held(file));
        assert_eq!(registry.len(), 1);

        assert!(registry.release(file));
        assert!(!registry.is_held(file));
        assert!(registry.is_empty());
    }

    #[test]
    fn second_acquire_fails() {
        let registry = OpenRegistry::new();
        let file = Path::new("/tmp/ptdb-registry/b.ptsb");

        registry.acquire(file).unwrap();
        let err = registry.acquire(file).unwrap_err();
        assert!(matches!(err, DbError::AlreadyOpen { .. }));
    }

    #[test]
    fn relative_and_absolute_forms_collide() {
        let registry = OpenRegistry::new();
        let relative = Path::new("ptdb-registry-c.ptsb");
        let absolute = std::env::current_dir().unwrap().join(relative);

        registry.acquire(relative).unwrap();
        assert!(registry.acquire(&absolute).is_err());
    }

    #[test]
    fn parent_dir_segments_collide() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let direct = dir.path().join("db.ptsb");
        let roundabout = dir.path().join("sub").join("..").join("db.ptsb");

        let registry = OpenRegistry::new();
        registry.acquire(&direct).unwrap();
        let err = registry.acquire(&roundabout).unwrap_err();
        assert!(matches!(err, DbError::AlreadyOpen { .. }));
        assert!(registry.release(&roundabout));
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_collides() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let registry = OpenRegistry::new();
        registry.acquire(&real.join("db.ptsb")).unwrap();
        assert!(registry.acquire(&link.join("db.ptsb")).is_err());
    }

    #[test]
    fn missing_parent_falls_back_to_absolute() {
        let registry = OpenRegistry::new();
        let file = Path::new("/tmp/ptdb-registry-missing/nested/f.ptsb");
        registry.acquire(file).unwrap();
        assert!(registry.is_held(file));
    }

    #[test]
    fn clones_share_the_table() {
        let registry = OpenRegistry::new();
        let other = registry.clone();
        let file = Path::new("/tmp/ptdb-registry/d.ptsb");

        registry.acquire(file).unwrap();
        assert!(other.acquire(file).is_err());
        assert!(other.release(file));
        assert!(registry.acquire(file).is_ok());
    }

    #[test]
    fn separate_registries_are_independent() {
        let file = Path::new("/tmp/ptdb-registry/e.ptsb");
        let a = OpenRegistry::new();
        let b = OpenRegistry::new();
        a.acquire(file).unwrap();
        assert!(b.acquire(file).is_ok());
    }

    #[test]
    fn release_unknown_is_false() {
        let registry = OpenRegistry::new();
        assert!(!registry.release(Path::new("/tmp/ptdb-registry/never.ptsb")));
    }
}
