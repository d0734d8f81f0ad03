//! Error types for the batch engine

use thiserror::Error;

/// Result type alias for the batch engine
pub type Result<T> = std::result::Result<T, BatchError>;

/// Main error type for the batch engine
///
/// Framing and parsing errors fail the whole batch. A sub-request that the
/// server answered with a 4xx/5xx status is *not* an error: it is delivered as
/// an ordinary response item whose status the caller inspects.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Batch reused after it was sent
    #[error("Sequence error: {0}")]
    Sequence(String),

    /// Boundary missing or mismatched, truncated part, unparseable status line
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// An embedded response carried a 4xx/5xx status
    ///
    /// Only produced on request, through `ODataResponse::error_for_status`.
    #[error("Sub-request failed with status {status} {message} (content-id: {content_id:?})")]
    SubRequestFailure {
        status: u16,
        message: String,
        content_id: Option<u32>,
    },

    /// The server stopped a changeset at a failure; later sub-requests were not applied
    #[error(
        "Changeset aborted: {executed} of {requested} requests answered (failed content-id: {failed_content_id:?})"
    )]
    ChangesetAborted {
        requested: usize,
        executed: usize,
        failed_content_id: Option<u32>,
        status: Option<u16>,
    },

    /// An item was populated with a request it cannot carry
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The `$batch` request itself was refused by the service
    #[error("Batch rejected with status {status} {message}")]
    BatchRejected {
        status: u16,
        message: String,
        body: String,
    },

    /// Connection or I/O failure below the protocol layer
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
