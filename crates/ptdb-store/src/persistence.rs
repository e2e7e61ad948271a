//! Whole-document persistence.
//!
//! A database lives in exactly one file, `<path>.ptsb`, holding the complete
//! document as compact JSON. Every save rewrites the whole file.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use ptdb_types::Document;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Extension appended to the database path to name the backing file.
pub const FILE_EXTENSION: &str = "ptsb";

/// The backing file for a database path: the path with `.ptsb` appended.
///
/// The extension is appended rather than substituted, so `data/users.v2`
/// maps to `data/users.v2.ptsb`.
pub fn backing_file(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(FILE_EXTENSION);
    PathBuf::from(name)
}

/// Serialise a document to its on-disk bytes.
pub fn encode(doc: &Document) -> DbResult<Vec<u8>> {
    serde_json::to_vec(doc).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Decode on-disk bytes into a document.
///
/// `file` is only used to name the file in the error.
pub fn decode(file: &Path, bytes: &[u8]) -> DbResult<Document> {
    serde_json::from_slice(bytes).map_err(|source| DbError::Corrupted {
        path: file.to_path_buf(),
        source,
    })
}

/// Read the backing file.
///
/// Returns `Ok(None)` when the file does not exist or holds nothing but
/// whitespace; the caller then starts a fresh document. Content that fails
/// to decode is an error, never silently replaced.
pub async fn read_document(file: &Path) -> DbResult<Option<Document>> {
    let bytes = match tokio::fs::read(file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %file.display(), "no backing file yet");
            return Ok(None);
        }
        Err(source) => {
            return Err(DbError::ReadFailure {
                path: file.to_path_buf(),
                source,
            })
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        debug!(path = %file.display(), "backing file is empty");
        return Ok(None);
    }

    decode(file, &bytes).map(Some)
}

/// Overwrite the backing file with `bytes`.
pub async fn write_document(file: &Path, bytes: &[u8]) -> DbResult<()> {
    tokio::fs::write(file, bytes)
        .await
        .map_err(|source| DbError::WriteFailure {
            path: file.to_path_buf(),
            source,
        })?;
    debug!(path = %file.display(), bytes = bytes.len(), "document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backing_file_appends_extension() {
        assert_eq!(backing_file(Path::new("test/db")), PathBuf::from("test/db.ptsb"));
        assert_eq!(
            backing_file(Path::new("data/users.v2")),
            PathBuf::from("data/users.v2.ptsb")
        );
    }

    #[test]
    fn encode_decode_preserves_document() {
        let mut doc = Document::new();
        doc.records.insert("foo".into(), json!({"bar": [1, 2, 3]}));
        let bytes = encode(&doc).unwrap();
        assert_eq!(decode(Path::new("x"), &bytes).unwrap(), doc);
    }

    #[test]
    fn decode_garbage_is_corrupted() {
        let err = decode(Path::new("bad.ptsb"), b"{not json").unwrap_err();
        match err {
            DbError::Corrupted { path, .. } => assert_eq!(path, PathBuf::from("bad.ptsb")),
            other => panic!("expected Corrupted, got {other}"),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("absent.ptsb");
        assert!(read_document(&file).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.ptsb");
        std::fs::write(&file, b"").unwrap();
        assert!(read_document(&file).await.unwrap().is_none());

        std::fs::write(&file, b"  \n").unwrap();
        assert!(read_document(&file).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = backing_file(&dir.path().join("db"));
        let doc = Document::new();
        write_document(&file, &encode(&doc).unwrap()).await.unwrap();
        assert_eq!(read_document(&file).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("corrupt.ptsb");
        std::fs::write(&file, b"[1, 2").unwrap();
        assert!(matches!(
            read_document(&file).await,
            Err(DbError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("no/such/dir/db.ptsb");
        assert!(matches!(
            write_document(&file, b"{}").await,
            Err(DbError::WriteFailure { .. })
        ));
    }
}
