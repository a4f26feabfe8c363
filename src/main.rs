//! # Staged RAG CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the index schema and the document store directory |
//! | `rag ingest <path>` | Load JSONL summary records into both stores |
//! | `rag ask "<question>"` | Run the staged pipeline and print WIKI, API and FINAL |
//! | `rag retrieve "<question>" --stage wiki` | Run one multi-query retrieval |
//! | `rag serve stdio` | MCP server over stdin/stdout |
//! | `rag serve http` | MCP streamable HTTP plus the JSON tool API |
//! | `rag pdf-to-md <pdf> <md>` | Convert a page range of a PDF to Markdown |

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use staged_rag::answer::source_label;
use staged_rag::pipeline::{Scope, StagedPipeline};
use staged_rag::retrieve::ResultOrigin;
use staged_rag::{config, ingest, logging, migrate, pdf, server};

/// Staged retrieval-augmented answering over wiki and API summaries.
///
/// All commands except `pdf-to-md` read the TOML file given by `--config`.
/// See `config/rag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Staged multi-query retrieval over wiki and API summaries, served over MCP",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index schema and the document store directory.
    ///
    /// Idempotent.
    Init,

    /// Load summary records from a `.jsonl` file or a directory of them.
    Ingest {
        path: PathBuf,
    },

    /// Answer a question with the staged pipeline.
    Ask {
        question: String,
    },

    /// Run one multi-query retrieval and list the result set.
    Retrieve {
        question: String,

        /// Which summary collection to search: `wiki` or `api`.
        #[arg(long, default_value = "wiki")]
        stage: Scope,

        /// Cap on query variants, including the question itself.
        #[arg(long)]
        max_variants: Option<usize>,
    },

    /// Start an MCP server.
    Serve {
        #[arg(value_enum)]
        transport: Transport,
    },

    /// Convert pages of a PDF into a Markdown file.
    PdfToMd {
        pdf: PathBuf,
        md: PathBuf,

        /// First page, 1-based.
        #[arg(long, default_value_t = pdf::DEFAULT_START_PAGE)]
        start_page: usize,

        /// Last page, inclusive.
        #[arg(long, default_value_t = pdf::DEFAULT_END_PAGE)]
        end_page: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    /// JSON-RPC over stdin/stdout.
    Stdio,
    /// Streamable HTTP at `/mcp` on `[server].bind`.
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    // pdf-to-md is the only command that runs without a config file
    let load = || config::load_config(&cli.config);

    match cli.command {
        Commands::PdfToMd {
            pdf: pdf_path,
            md,
            start_page,
            end_page,
        } => {
            pdf::pdf_to_markdown(&pdf_path, &md, start_page, end_page)?;
            println!("Saved Markdown file to {}", md.display());
        }
        Commands::Init => {
            let cfg = load()?;
            migrate::run_migrations(&cfg).await?;
            println!("index: {}", cfg.index.db_path().display());
            println!("docstore: {}", cfg.docstore.path.display());
            println!("ok");
        }
        Commands::Ingest { path } => {
            ingest::run_ingest(&load()?, &path).await?;
        }
        Commands::Ask { question } => {
            let pipeline = StagedPipeline::from_config(&load()?).await?;
            let answer = pipeline.run(&question).await?;
            println!("{}", answer.segments().join("\n\n"));
        }
        Commands::Retrieve {
            question,
            stage,
            max_variants,
        } => {
            let pipeline = StagedPipeline::from_config(&load()?).await?;
            let cap = max_variants.unwrap_or(pipeline.limits(stage).max_variants);
            let result = pipeline.retrieve(stage, &question, Some(cap)).await?;

            let origin = match result.origin {
                ResultOrigin::Originals => "documents",
                ResultOrigin::Summaries => "summaries",
            };
            println!("{} {}", result.len(), origin);
            for doc in &result.documents {
                let preview: String = doc.content.chars().take(160).collect();
                println!("- {}", source_label(doc, pipeline.id_key()));
                println!("  {}", preview.replace('\n', " "));
            }
        }
        Commands::Serve { transport } => {
            let cfg = load()?;
            match transport {
                Transport::Stdio => server::run_stdio(&cfg).await?,
                Transport::Http => server::run_http(&cfg).await?,
            }
        }
    }

    Ok(())
}
