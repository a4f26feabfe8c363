use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::store::file::FileDocStore;

/// Create the summary table and its indexes. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_collection ON summaries(collection)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summaries_created_at ON summaries(collection, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialise both persisted stores: the index schema and the document
/// store directory.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.index.db_path()).await?;
    create_schema(&pool).await?;
    pool.close().await;

    FileDocStore::open(&config.docstore.path)?;
    Ok(())
}
