//! Diagnostic logging setup.
//!
//! Events go to stderr so stdout stays reserved for command output and the
//! stdio MCP transport. `RAG_LOG` takes an `EnvFilter` directive
//! (e.g. `staged_rag=debug`); the default level is `info`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RAG_LOG";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
