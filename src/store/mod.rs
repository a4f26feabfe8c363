//! Storage abstractions for the summary index and the document byte-store.
//!
//! The [`VectorIndex`] and [`DocStore`] traits are the two seams the
//! retrieval pipeline talks to. Backends:
//!
//! | Backend | Index | Document store |
//! |---------|-------|----------------|
//! | SQLite / filesystem | [`sqlite::SqliteIndex`] | [`file::FileDocStore`] |
//! | In-memory | [`memory::InMemoryIndex`] | [`memory::InMemoryDocStore`] |
//!
//! Implementations must be `Send + Sync`; the pipeline shares them across
//! concurrent requests behind `Arc` and never mutates them while serving.

pub mod file;
pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::Document;

/// Exact-match metadata filter: every entry must equal the record's
/// metadata value (as a string) for the record to match.
pub type MetadataFilter = BTreeMap<String, String>;

/// Returns `true` when `doc` satisfies every entry of `filter`.
pub fn matches_filter(doc: &Document, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, expected)| match doc.metadata.get(key) {
        Some(serde_json::Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

/// A similarity index over summary records.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` records matching `filter`, most similar first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Document>>;

    /// Add summary records. Returns the number stored.
    async fn add(&self, records: &[Document]) -> Result<usize>;
}

/// A key → bytes store holding the original documents.
#[async_trait]
pub trait DocStore: Send + Sync {
    /// Batch lookup. The result has one entry per key, in key order, with
    /// `None` for keys that are not present.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Batch write, overwriting existing keys.
    async fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()>;
}

/// An index handle with a fixed result count and filter, one per stage.
#[derive(Clone)]
pub struct ScopedIndex {
    index: Arc<dyn VectorIndex>,
    k: usize,
    filter: MetadataFilter,
}

impl ScopedIndex {
    pub fn new(index: Arc<dyn VectorIndex>, k: usize, filter: MetadataFilter) -> Self {
        Self { index, k, filter }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn filter(&self) -> &MetadataFilter {
        &self.filter
    }

    pub async fn query(&self, query: &str) -> Result<Vec<Document>> {
        self.index
            .similarity_search(query, self.k, &self.filter)
            .await
    }
}
