//! Error taxonomy for ingestion and question answering.
//!
//! Every variant here is local and recoverable: a failed ingest leaves the
//! session untouched and a failed answer leaves it loaded. Startup failures
//! (missing credential, invalid config) are reported through `anyhow` in
//! the binary instead.

use std::path::PathBuf;

use docchat_core::search::RetrievalError;

/// Format extraction failures.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The file extension is not one of pdf, xlsx, xls, csv.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// The file matched a supported format but could not be parsed.
    #[error("{format} extraction failed: {message}")]
    ExtractionFailure {
        format: &'static str,
        message: String,
    },
}

impl ExtractError {
    pub(crate) fn failure(format: &'static str, message: impl ToString) -> Self {
        Self::ExtractionFailure {
            format,
            message: message.to_string(),
        }
    }
}

/// Failures of [`Session::ingest`](crate::session::Session::ingest).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the external completion service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("no completion service is configured")]
    NotConfigured,

    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Failures of [`Session::answer`](crate::session::Session::answer).
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    /// No document has been ingested yet.
    #[error("no document is loaded")]
    NotReady,

    /// Nothing in the document cleared the relevance floor.
    #[error("no relevant information found")]
    NoRelevantResult,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl From<RetrievalError> for AnswerError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::NotReady => AnswerError::NotReady,
        }
    }
}
