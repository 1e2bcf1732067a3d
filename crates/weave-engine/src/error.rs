//! Fatal error taxonomy.
//!
//! Only request decoding, response encoding, and a missing prompts directory
//! abort an operation. Per-module parse failures and per-server discovery
//! failures degrade gracefully inside the pipeline and never surface here.

use thiserror::Error;
use weave_modules::scan::RepositoryError;

/// Errors that abort an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A request or configuration argument was not valid JSON.
    #[error("invalid request: {source}")]
    InvalidRequest {
        /// The decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// The prompts directory could not be loaded at all.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// A reply payload could not be encoded.
    #[error("failed to encode response: {source}")]
    Encode {
        /// The serializer failure.
        #[source]
        source: serde_json::Error,
    },
}
