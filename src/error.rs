//! Error types for the paperseek pipeline.
//!
//! Every fallible operation in the crate returns [`Result`]. Provider
//! failures carry the HTTP status and body verbatim so the boundary layer
//! can report them without re-contacting the service; abstention is *not*
//! an error and never appears here (it is a successful low-confidence
//! [`Answer`](crate::models::Answer)).

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration value is missing or invalid. Missing
    /// credentials are reported here, at the first provider call rather
    /// than at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// The corpus yielded no usable documents or no extractable text.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// The manifest file exists but could not be read or parsed. Treating
    /// a corrupt manifest as empty would silently re-embed the whole
    /// corpus, so this is surfaced instead.
    #[error("manifest at {} is unreadable: {detail}", .path.display())]
    Manifest { path: PathBuf, detail: String },

    /// A provider returned a non-success HTTP status.
    #[error("{provider} request failed ({status}): {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// A provider call failed before a response was received (connect
    /// error, timeout, malformed transport).
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        source: reqwest::Error,
    },

    /// A provider responded with 2xx but not the expected shape.
    #[error("{provider} returned an invalid response: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },

    /// Another ingestion run holds the advisory index lock.
    #[error("index is locked by another ingestion run: {}", .0.display())]
    IndexLocked(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
