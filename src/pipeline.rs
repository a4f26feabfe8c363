//! The staged wiki → API → synthesis pipeline.
//!
//! ```text
//! WikiRetrieve ─▶ WikiAnswer ─▶ ApiRetrieve ─▶ ApiAnswer ─▶ Synthesize ─▶ Done
//!                     │              ▲
//!                     └─ "Wiki findings" enrich the API retrieval query
//! ```
//!
//! Stages run strictly in order and the first failure aborts the run. A
//! [`StagedPipeline`] is built once at start-up from explicit parts and
//! never mutated afterwards, so one instance can serve concurrent runs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use tracing::Instrument;

use crate::answer::{answer, answer_from_docs};
use crate::config::{Config, StageConfig};
use crate::embedding::create_provider;
use crate::expand::QueryExpander;
use crate::llm::{create_chat_model, ChatModel};
use crate::retrieve::{MultiQueryRetriever, RetrievalResult};
use crate::store::file::FileDocStore;
use crate::store::sqlite::SqliteIndex;
use crate::store::{DocStore, ScopedIndex, VectorIndex};

pub const WIKI_LABEL: &str = "WIKI:";
pub const API_LABEL: &str = "API:";
pub const FINAL_LABEL: &str = "FINAL:";

/// Pipeline states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    WikiRetrieve,
    WikiAnswer,
    ApiRetrieve,
    ApiAnswer,
    Synthesize,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::WikiRetrieve => "wiki_retrieve",
            Stage::WikiAnswer => "wiki_answer",
            Stage::ApiRetrieve => "api_retrieve",
            Stage::ApiAnswer => "api_answer",
            Stage::Synthesize => "synthesize",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Which summary collection a retrieval targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Wiki,
    Api,
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wiki" => Ok(Scope::Wiki),
            "api" => Ok(Scope::Api),
            other => anyhow::bail!("invalid stage '{}': expected wiki or api", other),
        }
    }
}

/// Answering limits for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLimits {
    pub max_variants: usize,
    pub max_docs: usize,
    pub max_chars: usize,
}

impl From<&StageConfig> for StageLimits {
    fn from(cfg: &StageConfig) -> Self {
        Self {
            max_variants: cfg.max_variants,
            max_docs: cfg.max_docs,
            max_chars: cfg.max_chars,
        }
    }
}

/// Everything a [`StagedPipeline`] needs, supplied by the caller.
pub struct PipelineParts {
    pub model: Arc<dyn ChatModel>,
    pub wiki_index: ScopedIndex,
    pub api_index: ScopedIndex,
    pub doc_store: Arc<dyn DocStore>,
    pub wiki: StageLimits,
    pub api: StageLimits,
    pub id_key: String,
}

/// The three answers of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedAnswer {
    pub wiki: String,
    pub api: String,
    pub final_answer: String,
}

impl StagedAnswer {
    /// Labeled text segments in stage order: WIKI, API, FINAL.
    pub fn segments(&self) -> Vec<String> {
        vec![
            format!("{}\n{}", WIKI_LABEL, self.wiki),
            format!("{}\n{}", API_LABEL, self.api),
            format!("{}\n{}", FINAL_LABEL, self.final_answer),
        ]
    }
}

/// Retrieval query for the API stage: the question plus the wiki answer.
pub fn enriched_query(question: &str, wiki_answer: &str) -> String {
    format!("{}\n\nWiki findings:\n{}", question, wiki_answer)
}

/// Context for the synthesis call.
pub fn synthesis_context(question: &str, wiki_answer: &str, api_answer: &str) -> String {
    format!(
        "WIKI ANSWER:\n{}\n\nAPI ANSWER:\n{}\n\nOriginal question:\n{}",
        wiki_answer.trim(),
        api_answer.trim(),
        question
    )
}

pub struct StagedPipeline {
    model: Arc<dyn ChatModel>,
    retriever: MultiQueryRetriever,
    wiki_index: ScopedIndex,
    api_index: ScopedIndex,
    doc_store: Arc<dyn DocStore>,
    wiki: StageLimits,
    api: StageLimits,
}

impl StagedPipeline {
    pub fn new(parts: PipelineParts) -> Self {
        let retriever =
            MultiQueryRetriever::new(QueryExpander::new(parts.model.clone()), parts.id_key);
        Self {
            model: parts.model,
            retriever,
            wiki_index: parts.wiki_index,
            api_index: parts.api_index,
            doc_store: parts.doc_store,
            wiki: parts.wiki,
            api: parts.api,
        }
    }

    /// Build the persisted-store pipeline described by `config`: the SQLite
    /// summary index, the file document store, and the configured models.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        let index: Arc<dyn VectorIndex> = Arc::new(
            SqliteIndex::open(
                &config.index.db_path(),
                &config.index.collection,
                provider,
                config.embedding.batch_size,
            )
            .await?,
        );
        let doc_store: Arc<dyn DocStore> = Arc::new(FileDocStore::open(&config.docstore.path)?);
        let model = create_chat_model(&config.llm)?;

        let wiki_cfg = &config.pipeline.wiki;
        let api_cfg = &config.pipeline.api;
        Ok(Self::new(PipelineParts {
            model,
            wiki_index: ScopedIndex::new(index.clone(), wiki_cfg.k, wiki_cfg.filter.clone()),
            api_index: ScopedIndex::new(index, api_cfg.k, api_cfg.filter.clone()),
            doc_store,
            wiki: wiki_cfg.into(),
            api: api_cfg.into(),
            id_key: config.index.id_key.clone(),
        }))
    }

    pub fn id_key(&self) -> &str {
        self.retriever.id_key()
    }

    pub fn limits(&self, scope: Scope) -> StageLimits {
        match scope {
            Scope::Wiki => self.wiki,
            Scope::Api => self.api,
        }
    }

    fn index(&self, scope: Scope) -> &ScopedIndex {
        match scope {
            Scope::Wiki => &self.wiki_index,
            Scope::Api => &self.api_index,
        }
    }

    /// One multi-query retrieval against a stage's scoped index.
    pub async fn retrieve(
        &self,
        scope: Scope,
        query: &str,
        max_variants: Option<usize>,
    ) -> Result<RetrievalResult> {
        self.retriever
            .retrieve(query, self.index(scope), self.doc_store.as_ref(), max_variants)
            .await
    }

    async fn answer_stage(
        &self,
        scope: Scope,
        question: &str,
        result: &RetrievalResult,
    ) -> Result<String> {
        let limits = self.limits(scope);
        answer_from_docs(
            question,
            &result.documents,
            self.model.as_ref(),
            limits.max_docs,
            limits.max_chars,
            self.retriever.id_key(),
        )
        .await
    }

    /// Run all stages for `question`.
    pub async fn run(&self, question: &str) -> Result<StagedAnswer> {
        let span = tracing::info_span!("staged_pipeline", question_len = question.len());
        self.run_stages(question).instrument(span).await
    }

    async fn run_stages(&self, question: &str) -> Result<StagedAnswer> {
        tracing::info!(stage = %Stage::WikiRetrieve);
        let wiki_docs = self
            .retrieve(Scope::Wiki, question, Some(self.wiki.max_variants))
            .await?;

        tracing::info!(stage = %Stage::WikiAnswer, docs = wiki_docs.len());
        let wiki_answer = self.answer_stage(Scope::Wiki, question, &wiki_docs).await?;

        tracing::info!(stage = %Stage::ApiRetrieve);
        let api_query = enriched_query(question, &wiki_answer);
        let api_docs = self
            .retrieve(Scope::Api, &api_query, Some(self.api.max_variants))
            .await?;

        // the API answer is asked with the original question, not api_query
        tracing::info!(stage = %Stage::ApiAnswer, docs = api_docs.len());
        let api_answer = self.answer_stage(Scope::Api, question, &api_docs).await?;

        tracing::info!(stage = %Stage::Synthesize);
        let context = synthesis_context(question, &wiki_answer, &api_answer);
        let final_answer = answer(question, &context, self.model.as_ref()).await?;

        tracing::info!(stage = %Stage::Done);
        Ok(StagedAnswer {
            wiki: wiki_answer,
            api: api_answer,
            final_answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enriched_query_layout() {
        assert_eq!(
            enriched_query("Q?", "wiki says"),
            "Q?\n\nWiki findings:\nwiki says"
        );
    }

    #[test]
    fn synthesis_context_trims_answers() {
        let ctx = synthesis_context("Q?", "  w \n", "\n a  ");
        assert_eq!(
            ctx,
            "WIKI ANSWER:\nw\n\nAPI ANSWER:\na\n\nOriginal question:\nQ?"
        );
    }

    #[test]
    fn segments_are_labeled_in_order() {
        let answer = StagedAnswer {
            wiki: "w".into(),
            api: "a".into(),
            final_answer: "f".into(),
        };
        assert_eq!(answer.segments(), vec!["WIKI:\nw", "API:\na", "FINAL:\nf"]);
    }

    #[test]
    fn scope_parses() {
        assert_eq!("wiki".parse::<Scope>().unwrap(), Scope::Wiki);
        assert_eq!("api".parse::<Scope>().unwrap(), Scope::Api);
        assert!("other".parse::<Scope>().is_err());
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::ApiRetrieve.to_string(), "api_retrieve");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
