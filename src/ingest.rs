//! Loading summary records into the index and the document store.
//!
//! Input is JSON Lines, one record per line:
//!
//! ```json
//! {"doc_id": "auth-guide", "summary": "How login works", "content": "...", "source": "wiki/auth.md", "source_type": "wiki_summary"}
//! ```
//!
//! `doc_id`, `source` and `metadata` are optional; a missing `doc_id` gets a
//! fresh UUID. The full `content` goes to the document store under `doc_id`
//! and the `summary` is embedded into the vector index carrying the
//! back-reference.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::models::{Document, Metadata, SOURCE_KEY};
use crate::store::file::FileDocStore;
use crate::store::sqlite::SqliteIndex;
use crate::store::{DocStore, VectorIndex};

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRecord {
    #[serde(default)]
    pub doc_id: Option<String>,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    pub source_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SummaryRecord {
    /// Split into `(doc_id, original document, summary record)`.
    pub fn into_documents(self, id_key: &str, type_key: &str) -> (String, Document, Document) {
        let doc_id = self
            .doc_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut metadata = self.metadata;
        metadata.insert(id_key.to_string(), doc_id.clone().into());
        metadata.insert(type_key.to_string(), self.source_type.into());
        if let Some(source) = self.source {
            metadata.insert(SOURCE_KEY.to_string(), source.into());
        }

        let original = Document {
            content: self.content,
            metadata: metadata.clone(),
        };
        let summary = Document {
            content: self.summary,
            metadata,
        };
        (doc_id, original, summary)
    }
}

/// Parse JSON Lines text. Blank lines are skipped; `origin` names the input
/// in error messages.
pub fn parse_jsonl(text: &str, origin: &str) -> Result<Vec<SummaryRecord>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: SummaryRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid record", origin, idx + 1))?;
        if record.summary.trim().is_empty() {
            bail!("{}:{}: summary must not be empty", origin, idx + 1);
        }
        if record.source_type.trim().is_empty() {
            bail!("{}:{}: source_type must not be empty", origin, idx + 1);
        }
        records.push(record);
    }
    Ok(records)
}

/// Read records from a `.jsonl` file or every `*.jsonl` file under a
/// directory, in path order.
pub fn scan_records(path: &Path) -> Result<Vec<SummaryRecord>> {
    let mut files = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "jsonl")
            {
                files.push(entry.into_path());
            }
        }
        files.sort();
    } else {
        files.push(path.to_path_buf());
    }

    let mut records = Vec::new();
    for file in files {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        records.extend(parse_jsonl(&text, &file.display().to_string())?);
    }
    Ok(records)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub records: usize,
    pub documents_written: usize,
    pub summaries_indexed: usize,
}

/// Write originals to `store` and summaries to `index`.
pub async fn ingest_records(
    records: Vec<SummaryRecord>,
    index: &dyn VectorIndex,
    store: &dyn DocStore,
    id_key: &str,
    type_key: &str,
) -> Result<IngestStats> {
    let mut stats = IngestStats {
        records: records.len(),
        ..Default::default()
    };
    if records.is_empty() {
        return Ok(stats);
    }

    let mut blobs = Vec::with_capacity(records.len());
    let mut summaries = Vec::with_capacity(records.len());
    for record in records {
        let (doc_id, original, summary) = record.into_documents(id_key, type_key);
        blobs.push((doc_id, original.to_blob()?));
        summaries.push(summary);
    }

    store.mset(&blobs).await?;
    stats.documents_written = blobs.len();
    stats.summaries_indexed = index.add(&summaries).await?;

    tracing::info!(
        records = stats.records,
        indexed = stats.summaries_indexed,
        "ingest complete"
    );
    Ok(stats)
}

/// `rag ingest <path>` against the configured persistent stores.
pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let records = scan_records(path)?;

    let provider = create_provider(&config.embedding)?;
    let index = SqliteIndex::open(
        &config.index.db_path(),
        &config.index.collection,
        provider,
        config.embedding.batch_size,
    )
    .await?;
    let store = FileDocStore::open(&config.docstore.path)?;

    let stats = ingest_records(
        records,
        &index,
        &store,
        &config.index.id_key,
        &config.pipeline.type_key,
    )
    .await?;
    let total = index.count().await?;
    index.close().await;

    println!("ingest {}", path.display());
    println!("  records: {}", stats.records);
    println!("  documents written: {}", stats.documents_written);
    println!("  summaries indexed: {}", stats.summaries_indexed);
    println!("  collection size: {}", total);
    println!("  docstore: {}", store.root().display());
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{InMemoryDocStore, InMemoryIndex};

    const LINES: &str = r#"
{"doc_id": "auth", "summary": "login flow", "content": "full auth page", "source": "wiki/auth.md", "source_type": "wiki_summary"}

{"summary": "token endpoint", "content": "POST /token ...", "source_type": "api_summary", "metadata": {"version": "v2"}}
"#;

    #[test]
    fn parses_records_and_skips_blank_lines() {
        let records = parse_jsonl(LINES, "test.jsonl").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].doc_id.as_deref(), Some("auth"));
        assert_eq!(records[1].doc_id, None);
        assert_eq!(records[1].metadata["version"], "v2");
    }

    #[test]
    fn bad_line_reports_position() {
        let err = parse_jsonl("{\"summary\": 1}\n", "x.jsonl").unwrap_err();
        assert!(err.to_string().contains("x.jsonl:1"));
        let err = parse_jsonl(
            "{\"summary\": \" \", \"content\": \"c\", \"source_type\": \"wiki_summary\"}",
            "x.jsonl",
        )
        .unwrap_err();
        assert!(err.to_string().contains("summary must not be empty"));
    }

    #[test]
    fn missing_doc_id_gets_uuid() {
        let records = parse_jsonl(LINES, "t").unwrap();
        let (id, original, summary) = records[1].clone().into_documents("doc_id", "source_type");
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(summary.meta_str("doc_id"), Some(id.as_str()));
        assert_eq!(summary.meta_str("source_type"), Some("api_summary"));
        assert_eq!(original.content, "POST /token ...");
    }

    #[tokio::test]
    async fn ingest_writes_both_stores() {
        let index = InMemoryIndex::new();
        let store = InMemoryDocStore::new();
        let records = parse_jsonl(LINES, "t").unwrap();
        assert!(index.is_empty());

        let stats = ingest_records(records, &index, &store, "doc_id", "source_type")
            .await
            .unwrap();
        assert_eq!(stats.summaries_indexed, 2);
        assert_eq!(index.len(), 2);

        let blobs = store.mget(&["auth".to_string()]).await.unwrap();
        let doc = Document::from_blob("auth", "doc_id", blobs[0].as_ref().unwrap());
        assert_eq!(doc.content, "full auth page");
        assert_eq!(doc.meta_str("source"), Some("wiki/auth.md"));
    }

    #[test]
    fn scans_directory_for_jsonl_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("a.jsonl"), LINES).unwrap();
        std::fs::write(tmp.path().join("nested/b.jsonl"), LINES).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(scan_records(tmp.path()).unwrap().len(), 4);
    }
}
