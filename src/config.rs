//! TOML configuration parsing and validation.
//!
//! The configuration is read once at start-up, validated, and then shared
//! read-only (behind `Arc`) by the pipeline and the servers.
//!
//! Only `[index]` and `[docstore]` are required; every other section falls
//! back to the defaults documented on its fields. See
//! `config/rag.example.toml` for a complete file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    pub docstore: DocStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Location and naming of the persisted summary index.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding `index.sqlite`.
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Metadata key carrying the back-reference into the document store.
    #[serde(default = "default_id_key")]
    pub id_key: String,
}

fn default_collection() -> String {
    "summaries".to_string()
}
fn default_id_key() -> String {
    "doc_id".to_string()
}

impl IndexConfig {
    /// Path of the SQLite file inside the index directory.
    pub fn db_path(&self) -> PathBuf {
        self.path.join("index.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocStoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama defaults to `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

/// Generation model settings, shared by query expansion and answering.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    /// Transport-level retries on 429/5xx. The pipeline itself never retries.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            temperature: 0.0,
            url: None,
            max_retries: 0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout() -> u64 {
    120
}

/// Type tag of wiki summary records.
pub const WIKI_SUMMARY_TYPE: &str = "wiki_summary";
/// Type tag of API summary records.
pub const API_SUMMARY_TYPE: &str = "api_summary";

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Metadata key holding the summary type tag.
    #[serde(default = "default_type_key")]
    pub type_key: String,
    #[serde(default = "StageConfig::wiki")]
    pub wiki: StageConfig,
    #[serde(default = "StageConfig::api")]
    pub api: StageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut pipeline = Self {
            type_key: default_type_key(),
            wiki: StageConfig::wiki(),
            api: StageConfig::api(),
        };
        pipeline.scope_stages();
        pipeline
    }
}

impl PipelineConfig {
    /// Give every stage without a filter `{<type_key> = "<stage>_summary"}`,
    /// so a stage never searches the other stage's summaries.
    fn scope_stages(&mut self) {
        for (stage, tag) in [
            (&mut self.wiki, WIKI_SUMMARY_TYPE),
            (&mut self.api, API_SUMMARY_TYPE),
        ] {
            if stage.filter.is_empty() {
                stage.filter.insert(self.type_key.clone(), tag.to_string());
            }
        }
    }
}

fn default_type_key() -> String {
    "source_type".to_string()
}

/// Retrieval and answering limits for one pipeline stage.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StageConfig {
    /// Results per index query.
    pub k: usize,
    /// Exact-match metadata filter applied to every index query. Missing or
    /// empty means `{<pipeline.type_key> = "<stage>_summary"}`.
    #[serde(default)]
    pub filter: BTreeMap<String, String>,
    pub max_variants: usize,
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_docs() -> usize {
    3
}
fn default_max_chars() -> usize {
    100_000
}

impl StageConfig {
    /// Wiki stage limits; the filter is filled in from `type_key`.
    pub fn wiki() -> Self {
        Self {
            k: 5,
            filter: BTreeMap::new(),
            max_variants: 3,
            max_docs: default_max_docs(),
            max_chars: default_max_chars(),
        }
    }

    /// API stage limits; the filter is filled in from `type_key`.
    pub fn api() -> Self {
        Self {
            k: 3,
            filter: BTreeMap::new(),
            max_variants: 2,
            max_docs: default_max_docs(),
            max_chars: default_max_chars(),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.k == 0 {
            anyhow::bail!("pipeline.{}.k must be >= 1", name);
        }
        if self.max_variants == 0 {
            anyhow::bail!("pipeline.{}.max_variants must be >= 1", name);
        }
        if self.max_docs == 0 {
            anyhow::bail!("pipeline.{}.max_docs must be >= 1", name);
        }
        if self.max_chars == 0 {
            anyhow::bail!("pipeline.{}.max_chars must be >= 1", name);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.index.id_key.trim().is_empty() {
        anyhow::bail!("index.id_key must not be empty");
    }
    if config.index.collection.trim().is_empty() {
        anyhow::bail!("index.collection must not be empty");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate generation model
    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    // Validate stages
    if config.pipeline.type_key.trim().is_empty() {
        anyhow::bail!("pipeline.type_key must not be empty");
    }
    config.pipeline.scope_stages();
    config.pipeline.wiki.validate("wiki")?;
    config.pipeline.api.validate("api")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[index]
path = "./data/index"

[docstore]
path = "./data/docs"
"#;

    fn tag(key: &str, value: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(key.to_string(), value.to_string())])
    }

    #[test]
    fn minimal_file_uses_stage_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.index.id_key, "doc_id");
        assert_eq!(cfg.index.db_path(), PathBuf::from("./data/index/index.sqlite"));
        assert_eq!(cfg.pipeline.wiki.k, 5);
        assert_eq!(cfg.pipeline.wiki.max_variants, 3);
        assert_eq!(cfg.pipeline.wiki.filter, tag("source_type", "wiki_summary"));
        assert_eq!(cfg.pipeline.api.k, 3);
        assert_eq!(cfg.pipeline.api.max_variants, 2);
        assert_eq!(cfg.pipeline.api.filter, tag("source_type", "api_summary"));
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.max_retries, 0);
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn stage_overrides_are_read() {
        let text = format!(
            "{}\n[pipeline.wiki]\nk = 8\nmax_variants = 4\nfilter = {{ kind = \"wiki\" }}\n",
            MINIMAL
        );
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.pipeline.wiki.k, 8);
        assert_eq!(cfg.pipeline.wiki.max_docs, 3);
        assert_eq!(cfg.pipeline.wiki.max_chars, 100_000);
        assert_eq!(
            cfg.pipeline.wiki.filter.get("kind").map(String::as_str),
            Some("wiki")
        );
        assert_eq!(cfg.pipeline.wiki.filter.len(), 1);
        // untouched stage keeps its defaults
        assert_eq!(cfg.pipeline.api.k, 3);
        assert_eq!(cfg.pipeline.api.filter, tag("source_type", "api_summary"));
    }

    #[test]
    fn partial_stage_section_keeps_type_filter() {
        let text = format!("{}\n[pipeline.wiki]\nk = 8\nmax_variants = 4\n", MINIMAL);
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.pipeline.wiki.k, 8);
        assert_eq!(cfg.pipeline.wiki.filter, tag("source_type", "wiki_summary"));

        let text = format!("{}\n[pipeline.api]\nk = 2\nmax_variants = 1\nfilter = {{}}\n", MINIMAL);
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.pipeline.api.filter, tag("source_type", "api_summary"));
    }

    #[test]
    fn type_key_drives_default_filters() {
        let text = format!("{}\n[pipeline]\ntype_key = \"kind\"\n", MINIMAL);
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.pipeline.wiki.filter, tag("kind", "wiki_summary"));
        assert_eq!(cfg.pipeline.api.filter, tag("kind", "api_summary"));

        // an explicit filter is left alone
        let text = format!(
            "{}\n[pipeline]\ntype_key = \"kind\"\n\n[pipeline.api]\nk = 3\nmax_variants = 2\nfilter = {{ source_type = \"api_summary\" }}\n",
            MINIMAL
        );
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.pipeline.wiki.filter, tag("kind", "wiki_summary"));
        assert_eq!(cfg.pipeline.api.filter, tag("source_type", "api_summary"));
    }

    #[test]
    fn default_pipeline_is_scoped() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.wiki.filter, tag("source_type", WIKI_SUMMARY_TYPE));
        assert_eq!(pipeline.api.filter, tag("source_type", API_SUMMARY_TYPE));
    }

    #[test]
    fn rejects_zero_k() {
        let text = format!("{}\n[pipeline.api]\nk = 0\nmax_variants = 2\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("pipeline.api.k"));
    }

    #[test]
    fn rejects_unknown_llm_provider() {
        let text = format!("{}\n[llm]\nprovider = \"mystery\"\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn enabled_embedding_requires_dims() {
        let text = format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
            MINIMAL
        );
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn example_file_parses() {
        let cfg = parse_config(include_str!("../config/rag.example.toml")).unwrap();
        assert_eq!(cfg.embedding.provider, "openai");
        let defaults = PipelineConfig::default();
        assert_eq!(cfg.pipeline.wiki, defaults.wiki);
        assert_eq!(cfg.pipeline.api, defaults.api);
    }

    #[test]
    fn missing_index_section_fails() {
        assert!(parse_config("[docstore]\npath = \"x\"\n").is_err());
    }
}
