pub mod types;
pub mod prompt;
pub mod parser;
pub mod templates;
pub mod ollama;
pub mod mock;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use templates::*;
pub use ollama::*;
pub use mock::*;
pub use orchestrator::*;

use thiserror::Error;

/// Failures of a single generation call or of run setup.
///
/// Display strings feed the retry classifier, so each variant keeps the
/// vocabulary it is classified by ("network", "timed out", the status code).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("validation error: invalid assessment identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("network error: backend unreachable at {0}")]
    Connection(String),

    #[error("generation call timed out after {0}ms")]
    Timeout(u64),

    #[error("backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("network error: HTTP request failed: {0}")]
    HttpClient(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
