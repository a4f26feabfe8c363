//! Multi-query retrieval with summary → original resolution.
//!
//! ```text
//! question ──expand──▶ variants ──query each──▶ summaries
//!     ──dedup by canonical key──▶ unique summaries
//!     ──collect back-references──▶ unique ids ──mget──▶ originals
//! ```
//!
//! When none of the back-references resolve, the de-duplicated summaries
//! themselves are the result, so a retrieval that produced hits is never
//! reported as empty.

use std::collections::HashSet;

use anyhow::Result;

use crate::expand::QueryExpander;
use crate::models::Document;
use crate::store::{DocStore, ScopedIndex};

/// Where the documents of a [`RetrievalResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrigin {
    /// Resolved from the document store.
    Originals,
    /// Fallback: the de-duplicated summary records.
    Summaries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub documents: Vec<Document>,
    pub origin: ResultOrigin,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Remove records whose canonical key was already seen; first occurrence wins.
pub fn dedup_records(records: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|doc| seen.insert(doc.canonical_key()))
        .collect()
}

/// Back-reference ids in first-occurrence order, skipping records without one.
pub fn unique_ids(records: &[Document], id_key: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|doc| doc.meta_str(id_key))
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct MultiQueryRetriever {
    expander: QueryExpander,
    id_key: String,
}

impl MultiQueryRetriever {
    pub fn new(expander: QueryExpander, id_key: impl Into<String>) -> Self {
        Self {
            expander,
            id_key: id_key.into(),
        }
    }

    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    /// Expand `question`, query `index` once per variant (sequentially), and
    /// resolve the hits through `doc_store`.
    ///
    /// Any expansion, index, or store error aborts the whole retrieval.
    pub async fn retrieve(
        &self,
        question: &str,
        index: &ScopedIndex,
        doc_store: &dyn DocStore,
        max_variants: Option<usize>,
    ) -> Result<RetrievalResult> {
        let variants = self.expander.expand_capped(question, max_variants).await?;

        let mut hits = Vec::new();
        for variant in &variants {
            hits.extend(index.query(variant).await?);
        }
        let total_hits = hits.len();
        let summaries = dedup_records(hits);

        let ids = unique_ids(&summaries, &self.id_key);
        let mut originals = Vec::new();
        if !ids.is_empty() {
            let blobs = doc_store.mget(&ids).await?;
            for (id, blob) in ids.iter().zip(blobs) {
                if let Some(bytes) = blob {
                    originals.push(Document::from_blob(id, &self.id_key, &bytes));
                }
            }
        }

        tracing::info!(
            k = index.k(),
            filter = ?index.filter(),
            variants = variants.len(),
            hits = total_hits,
            unique = summaries.len(),
            ids = ids.len(),
            resolved = originals.len(),
            "multi-query retrieval"
        );

        if originals.is_empty() {
            Ok(RetrievalResult {
                documents: summaries,
                origin: ResultOrigin::Summaries,
            })
        } else {
            Ok(RetrievalResult {
                documents: originals,
                origin: ResultOrigin::Originals,
            })
        }
    }
}
