//! Core data models shared by the stores, the retriever, and the pipeline.
//!
//! Summary records (from the vector index) and original documents (from the
//! document store) share one shape, [`Document`]: text content plus a sorted
//! metadata map.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Document metadata. A `BTreeMap` keeps keys sorted, so serialization is
/// independent of insertion order.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key holding the human-readable source label.
pub const SOURCE_KEY: &str = "source";

/// A summary record or a resolved original document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insertion for string values.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata
            .insert(key.to_string(), serde_json::Value::String(value.into()));
        self
    }

    /// Returns a metadata value when it is a non-empty string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Content-based identity used for de-duplication.
    ///
    /// Hex SHA-256 of the compact JSON encoding of `{content, metadata}`
    /// with object keys sorted at every level, so two records with the same
    /// content and metadata always produce the same key.
    pub fn canonical_key(&self) -> String {
        let metadata = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), canonicalize(v)))
            .collect::<serde_json::Map<_, _>>();
        let encoded = serde_json::json!({
            "content": self.content,
            "metadata": metadata,
        });
        hex::encode(Sha256::digest(encoded.to_string().as_bytes()))
    }

    /// Encode as a document store blob.
    pub fn to_blob(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode a document store blob stored under `id`.
    ///
    /// Blobs that are not `Document` JSON are taken as plain text. Either
    /// way the back-reference `id_key` is filled in when missing.
    pub fn from_blob(id: &str, id_key: &str, blob: &[u8]) -> Self {
        let mut doc = serde_json::from_slice::<Document>(blob)
            .unwrap_or_else(|_| Document::new(String::from_utf8_lossy(blob).into_owned()));
        doc.metadata
            .entry(id_key.to_string())
            .or_insert_with(|| serde_json::Value::String(id.to_string()));
        doc
    }
}

/// Rebuild a JSON value with every object's keys in sorted order.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_key_ignores_insertion_order() {
        let mut a = Document::new("body");
        a.metadata.insert("doc_id".into(), json!("d1"));
        a.metadata.insert("source".into(), json!("wiki/a.md"));
        a.metadata.insert("extra".into(), json!({"z": 1, "a": [1, 2]}));

        let mut b = Document::new("body");
        b.metadata.insert("extra".into(), json!({"a": [1, 2], "z": 1}));
        b.metadata.insert("source".into(), json!("wiki/a.md"));
        b.metadata.insert("doc_id".into(), json!("d1"));

        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn canonical_key_sees_content_and_metadata() {
        let base = Document::new("body").with_meta("doc_id", "d1");
        let other_content = Document::new("body!").with_meta("doc_id", "d1");
        let other_meta = Document::new("body").with_meta("doc_id", "d2");
        assert_ne!(base.canonical_key(), other_content.canonical_key());
        assert_ne!(base.canonical_key(), other_meta.canonical_key());
    }

    #[test]
    fn blob_round_trip_keeps_metadata() {
        let doc = Document::new("full text")
            .with_meta("doc_id", "d1")
            .with_meta("source", "api/foo.md");
        let blob = doc.to_blob().unwrap();
        assert_eq!(Document::from_blob("d1", "doc_id", &blob), doc);
    }

    #[test]
    fn plain_text_blob_gets_back_reference() {
        let doc = Document::from_blob("d7", "doc_id", b"just some text");
        assert_eq!(doc.content, "just some text");
        assert_eq!(doc.meta_str("doc_id"), Some("d7"));
    }

    #[test]
    fn meta_str_skips_empty_and_non_strings() {
        let mut doc = Document::new("x").with_meta("doc_id", "");
        doc.metadata.insert("n".into(), json!(3));
        assert_eq!(doc.meta_str("doc_id"), None);
        assert_eq!(doc.meta_str("n"), None);
        assert_eq!(doc.meta_str("missing"), None);
    }
}
