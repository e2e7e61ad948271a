use std::fmt;

use serde::Serialize;

use crate::error::{DbError, DbResult};

/// A BLAKE3 digest of serialised content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Domain-separated BLAKE3 hasher.
///
/// The whole-document digest and the per-watch value digests use different
/// domain tags, so a watched subtree that happens to serialise like a full
/// document never compares equal to it.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for the full serialised document (the dirty gate).
    pub const DOCUMENT: Self = Self {
        domain: "ptdb-document-v1",
    };
    /// Hasher for values observed at watched paths.
    pub const WATCH: Self = Self {
        domain: "ptdb-watch-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest(*hasher.finalize().as_bytes())
    }

    /// Serialise a value as JSON and hash the bytes.
    pub fn hash_json<T: Serialize + ?Sized>(&self, value: &T) -> DbResult<Digest> {
        let data =
            serde_json::to_vec(value).map_err(|e| DbError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        let a = ContentHasher::DOCUMENT.hash(b"hello world");
        let b = ContentHasher::DOCUMENT.hash(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn domains_are_separated() {
        let doc = ContentHasher::DOCUMENT.hash(b"same");
        let watch = ContentHasher::WATCH.hash(b"same");
        assert_ne!(doc, watch);
    }

    #[test]
    fn json_key_order_is_canonical() {
        // serde_json maps are sorted, so insertion order cannot leak into the digest.
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            ContentHasher::WATCH.hash_json(&a).unwrap(),
            ContentHasher::WATCH.hash_json(&b).unwrap()
        );
    }

    #[test]
    fn content_change_changes_digest() {
        let a = ContentHasher::DOCUMENT.hash_json(&json!({"foo": "bar"})).unwrap();
        let b = ContentHasher::DOCUMENT.hash_json(&json!({"foo": "baz"})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_rendering() {
        let d = Digest::from_bytes([0xab; 32]);
        assert_eq!(d.to_hex().len(), 64);
        assert!(d.to_string().starts_with("abab"));
        assert_eq!(format!("{d:?}"), "Digest(abababababab)");
        assert_eq!(d.as_bytes(), &[0xab; 32]);
    }
}
