//! SQLite-backed summary index.
//!
//! Summaries live in the `summaries` table (see [`crate::migrate`]) with
//! their embedding stored as a little-endian f32 BLOB. Search embeds the
//! query, loads the collection, applies the metadata filter, and ranks the
//! remaining rows by cosine similarity. Ties keep insertion order.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, EmbeddingProvider};
use crate::migrate;
use crate::models::{Document, Metadata};

use super::{matches_filter, MetadataFilter, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl SqliteIndex {
    /// Open the index file, creating the schema when missing.
    pub async fn open(
        db_path: &Path,
        collection: &str,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self> {
        let pool = db::connect(db_path)
            .await
            .with_context(|| format!("Failed to open index at {}", db_path.display()))?;
        migrate::create_schema(&pool).await?;
        Ok(Self {
            pool,
            collection: collection.to_string(),
            provider,
            batch_size: batch_size.max(1),
        })
    }

    /// Number of summaries in this collection.
    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Document>> {
        let query_vec = embed_query(self.provider.as_ref(), query).await?;

        let rows = sqlx::query(
            "SELECT content, metadata_json, embedding FROM summaries WHERE collection = ? ORDER BY rowid ASC",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, Document)> = Vec::new();
        for row in rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata = serde_json::from_str::<Metadata>(&metadata_json).with_context(|| {
                format!(
                    "Corrupt metadata_json in collection '{}': {}",
                    self.collection, metadata_json
                )
            })?;
            let doc = Document {
                content: row.get("content"),
                metadata,
            };
            if !matches_filter(&doc, filter) {
                continue;
            }
            let blob: Vec<u8> = row.get("embedding");
            scored.push((cosine_similarity(&query_vec, &blob_to_vec(&blob)), doc));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, doc)| doc).collect())
    }

    async fn add(&self, records: &[Document]) -> Result<usize> {
        let mut stored = 0;
        for batch in records.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = self.provider.embed(&texts).await?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "embedding provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            let dims = self.provider.dims();
            if let Some(bad) = vectors.iter().find(|v| dims > 0 && v.len() != dims) {
                anyhow::bail!(
                    "embedding provider '{}' returned a {}-dim vector, expected {}",
                    self.provider.model_name(),
                    bad.len(),
                    dims
                );
            }

            let now = chrono::Utc::now().timestamp();
            let mut tx = self.pool.begin().await?;
            for (doc, vector) in batch.iter().zip(vectors.iter()) {
                sqlx::query(
                    "INSERT INTO summaries (id, collection, content, metadata_json, embedding, model, dims, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&self.collection)
                .bind(&doc.content)
                .bind(serde_json::to_string(&doc.metadata)?)
                .bind(vec_to_blob(vector))
                .bind(self.provider.model_name())
                .bind(vector.len() as i64)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            stored += batch.len();
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Deterministic embedder: letter frequency over a-z.
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes() {
                        if c.is_ascii_lowercase() {
                            v[(c - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    async fn open_index(tmp: &TempDir) -> SqliteIndex {
        SqliteIndex::open(
            &tmp.path().join("index").join("index.sqlite"),
            "summaries",
            Arc::new(LetterEmbedder),
            2,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn add_then_search_with_filter_and_k() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        let added = index
            .add(&[
                Document::new("aaaa").with_meta("source_type", "wiki_summary"),
                Document::new("zzzz").with_meta("source_type", "wiki_summary"),
                Document::new("aaab").with_meta("source_type", "api_summary"),
                Document::new("aabb").with_meta("source_type", "wiki_summary"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 4);
        assert_eq!(index.count().await.unwrap(), 4);

        let filter = MetadataFilter::from([("source_type".into(), "wiki_summary".into())]);
        let hits = index.similarity_search("aaa", 2, &filter).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["aaaa", "aabb"]);
        assert_eq!(hits[0].meta_str("source_type"), Some("wiki_summary"));
    }

    /// Claims 8 dims but returns 26.
    struct MismatchedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for MismatchedEmbedder {
        fn model_name(&self) -> &str {
            "mismatched"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            LetterEmbedder.embed(texts).await
        }
    }

    #[tokio::test]
    async fn add_rejects_wrong_dimension_vectors() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(
            &tmp.path().join("index.sqlite"),
            "summaries",
            Arc::new(MismatchedEmbedder),
            4,
        )
        .await
        .unwrap();

        let err = index.add(&[Document::new("hello")]).await.unwrap_err();
        assert!(err.to_string().contains("26-dim vector, expected 8"));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_metadata_row_fails_search() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;
        index
            .add(&[Document::new("aaaa").with_meta("source_type", "wiki_summary")])
            .await
            .unwrap();
        sqlx::query("UPDATE summaries SET metadata_json = 'not json'")
            .execute(&index.pool)
            .await
            .unwrap();

        let err = index
            .similarity_search("aaa", 5, &MetadataFilter::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Corrupt metadata_json"));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let a = SqliteIndex::open(&path, "a", Arc::new(LetterEmbedder), 8).await.unwrap();
        let b = SqliteIndex::open(&path, "b", Arc::new(LetterEmbedder), 8).await.unwrap();
        a.add(&[Document::new("hello")]).await.unwrap();

        assert_eq!(a.count().await.unwrap(), 1);
        assert_eq!(b.count().await.unwrap(), 0);
        let hits = b.similarity_search("hello", 5, &MetadataFilter::new()).await.unwrap();
        assert!(hits.is_empty());
    }
}
