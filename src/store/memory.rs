//! In-memory [`VectorIndex`] and [`DocStore`] implementations.
//!
//! Used by tests and by callers that assemble a pipeline without any
//! persisted state. The index has no embedder: it ranks records by how many
//! query terms their content contains, keeping insertion order among ties,
//! and like a vector index it always returns up to `k` filtered records.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

use super::{matches_filter, DocStore, MetadataFilter, VectorIndex};

/// In-memory summary index.
#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<Document>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index pre-loaded with `records`.
    pub fn with_records(records: Vec<Document>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn term_overlap(terms: &[String], text: &str) -> usize {
    let text_lower = text.to_lowercase();
    terms.iter().filter(|t| text_lower.contains(t.as_str())).count()
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Document>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))?;

        let mut scored: Vec<(usize, &Document)> = records
            .iter()
            .filter(|doc| matches_filter(doc, filter))
            .map(|doc| (term_overlap(&terms, &doc.content), doc))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn add(&self, records: &[Document]) -> Result<usize> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))?;
        stored.extend_from_slice(records);
        Ok(records.len())
    }
}

/// In-memory document byte-store.
#[derive(Default)]
pub struct InMemoryDocStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryDocStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store each document as a JSON blob under its key.
    pub fn with_documents(docs: Vec<(String, Document)>) -> Result<Self> {
        let mut blobs = HashMap::new();
        for (key, doc) in docs {
            blobs.insert(key, doc.to_blob()?);
        }
        Ok(Self {
            blobs: RwLock::new(blobs),
        })
    }
}

#[async_trait]
impl DocStore for InMemoryDocStore {
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        Ok(keys.iter().map(|k| blobs.get(k).cloned()).collect())
    }

    async fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        for (key, value) in entries {
            blobs.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
