//! Typed errors for the harvest pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. The taxonomy follows the
//! handling policy: transient failures are retried, parse failures end a
//! walk safely, schema failures drop a field, and only authentication
//! and checkpoint failures abort a run.

use thiserror::Error;

/// Errors from fetching listing pages, detail pages, or fallback websites.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transient network failure, safe to retry with backoff
    #[error("transient network failure: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request exceeded its deadline
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Credentials rejected or access revoked
    #[error("{service} rejected credentials: {reason}")]
    Auth { service: &'static str, reason: String },

    /// URL could not be parsed or uses a disallowed scheme
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_) | FetchError::Timeout { .. })
    }

    /// Whether this failure must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth { .. })
    }
}

/// Errors from the structured-extraction service.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// Credentials rejected; fatal for the run
    #[error("extractor rejected credentials: {reason}")]
    Auth { reason: String },

    /// Service unavailable or overloaded; Tier 1 degrades to empty
    #[error("extractor unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Reply arrived but carried no usable payload
    #[error("extractor returned no usable payload: {reason}")]
    Payload { reason: String },
}

/// A structured reply that could not be interpreted as a field map.
///
/// Raised only when the whole payload is unusable. Garbage in a single
/// field is dropped silently instead, keeping the rest.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Reply is not valid JSON
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Reply parsed but is not a JSON object
    #[error("reply is not a JSON object")]
    NotAnObject,
}

/// Listing markup the walker could not interpret.
#[derive(Debug, Error)]
#[error("unparsable listing markup: {reason}")]
pub struct ParseError {
    pub reason: String,
}

/// Failures while writing a checkpoint file.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// CSV serialization failed
    #[error("checkpoint serialization failed: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem operation failed
    #[error("checkpoint io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for a harvest run.
///
/// Everything else in the taxonomy degrades in place; only these abort a
/// run, and both do so after a final checkpoint attempt.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// An external service rejected our credentials
    #[error("authentication failed for {service}: {reason}")]
    Auth { service: &'static str, reason: String },

    /// A checkpoint could not be written; durability is gone
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for extractor calls.
pub type ExtractorResult<T> = std::result::Result<T, ExtractorError>;
