//! # Staged RAG
//!
//! Question answering over two collections of pre-computed summaries (wiki
//! pages and API descriptions), exposed as an MCP tool.
//!
//! A question is answered in three stages: a wiki answer, an API answer
//! retrieved with the wiki findings folded into the query, and a final
//! synthesis of the two. Each retrieval expands the question into several
//! phrasings, de-duplicates the matching summaries, and resolves them to
//! their full source documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Summary      │──▶│ Multi-query  │──▶│ Document    │
//! │ index        │   │ retriever    │   │ store       │
//! └──────────────┘   └──────┬───────┘   └─────────────┘
//!                           ▼
//!                   ┌───────────────┐
//!                   │ Staged        │  wiki ─▶ api ─▶ final
//!                   │ pipeline      │
//!                   └──────┬────────┘
//!               ┌──────────┴──────────┐
//!               ▼                     ▼
//!          ┌──────────┐         ┌────────────┐
//!          │   CLI    │         │    MCP     │
//!          │  (rag)   │         │ stdio/http │
//!          └──────────┘         └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag init                         # create the index and document store
//! rag ingest ./summaries/          # load JSONL summary records
//! rag ask "How do I rotate an API token?"
//! rag serve stdio                  # MCP over stdin/stdout
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, metadata, canonical keys |
//! | [`store`] | Vector index and document store traits and backends |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Generation model abstraction |
//! | [`expand`] | Query expansion |
//! | [`retrieve`] | Multi-query retrieval with identifier resolution |
//! | [`answer`] | Context formatting and answering |
//! | [`pipeline`] | The staged wiki → API → synthesis pipeline |
//! | [`traits`] | Tool trait and registry |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | stdio and HTTP servers |
//! | [`ingest`] | JSONL loading into both stores |
//! | [`pdf`] | PDF to Markdown conversion |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`logging`] | Tracing subscriber setup |

pub mod answer;
pub mod config;
pub mod db;
pub mod embedding;
pub mod expand;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod retrieve;
pub mod server;
pub mod store;
pub mod traits;
