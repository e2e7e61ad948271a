use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The record set: a mapping from top-level keys to arbitrary JSON values.
pub type Records = Map<String, Value>;

/// Wall-clock milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Bookkeeping stored alongside the records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// When the document was first initialised, in epoch milliseconds.
    pub created: u64,
    /// When the document last changed on disk, in epoch milliseconds.
    pub modified: u64,
}

impl DocumentInfo {
    /// Info stamped with the current time for both fields.
    pub fn now() -> Self {
        let now = now_ms();
        Self {
            created: now,
            modified: now,
        }
    }

    /// Set `modified` to the current time.
    ///
    /// Never moves backwards past `created`, so a skewed clock cannot make a
    /// document look modified before it existed.
    pub fn touch(&mut self) {
        self.modified = now_ms().max(self.created);
    }
}

/// The complete persisted state of one database.
///
/// Serialises as `{"records": {...}, "info": {"created": .., "modified": ..}}`,
/// which is exactly the on-disk format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub records: Records,
    pub info: DocumentInfo,
}

impl Document {
    /// A fresh, empty document created now.
    pub fn new() -> Self {
        Self {
            records: Records::new(),
            info: DocumentInfo::now(),
        }
    }

    /// Returns `true` when there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_document_is_empty_and_stamped() {
        let before = now_ms();
        let doc = Document::new();
        assert!(doc.is_empty());
        assert!(doc.info.created >= before);
        assert_eq!(doc.info.created, doc.info.modified);
    }

    #[test]
    fn touch_never_precedes_created() {
        let mut info = DocumentInfo {
            created: u64::MAX,
            modified: 0,
        };
        info.touch();
        assert_eq!(info.modified, u64::MAX);
    }

    #[test]
    fn serialises_to_records_and_info() {
        let mut doc = Document {
            records: Records::new(),
            info: DocumentInfo {
                created: 1,
                modified: 2,
            },
        };
        doc.records.insert("foo".into(), json!("bar"));

        let encoded = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            encoded,
            json!({"records": {"foo": "bar"}, "info": {"created": 1, "modified": 2}})
        );
    }

    #[test]
    fn decodes_persisted_shape() {
        let raw = r#"{"records":{"a":{"b":[1,2]}},"info":{"created":10,"modified":20}}"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.records["a"]["b"], json!([1, 2]));
        assert_eq!(doc.info.modified, 20);
    }

    #[test]
    fn missing_info_is_rejected() {
        let raw = r#"{"records":{}}"#;
        assert!(serde_json::from_str::<Document>(raw).is_err());
    }
}
