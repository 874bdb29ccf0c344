//! Error types
//!
//! Every error carries the resource type it was raised for, plus the offending
//! filter, field, index or HTTP status where one exists.

use crate::resource::{ApiVersion, Operation};
use thiserror::Error;

/// Errors raised by the resource engine and its transport
#[derive(Debug, Error)]
pub enum Error {
    /// No descriptor is registered under this name
    #[error("unknown resource type: {name}")]
    UnknownResourceType { name: String },

    /// The resource type needs a newer Redmine than the one configured
    #[error("{resource} requires Redmine {required} or later, connected server is {actual}")]
    ResourceVersionMismatch {
        resource: String,
        required: ApiVersion,
        actual: ApiVersion,
    },

    #[error("{resource} does not support the {operation} operation")]
    UnsupportedOperation {
        resource: String,
        operation: Operation,
    },

    #[error("{resource}: filter() requires at least one filter")]
    NoFiltersProvided { resource: String },

    /// Unknown filter key, or a filter the request path needs is missing
    #[error("{resource}: unknown or missing filter '{filter}'")]
    Filter { resource: String, filter: String },

    /// Result set filtering expects a sequence of identifiers
    #[error("result set filter expects an array of ids, got {found}")]
    FilterParam { found: String },

    #[error("{resource}: create() requires at least one field")]
    NoFieldsProvided { resource: String },

    /// Rejected by local pre-checks or by the server
    #[error("{resource} validation failed: {}", .messages.join("; "))]
    Validation {
        resource: String,
        status: Option<u16>,
        messages: Vec<String>,
    },

    #[error("index {index} is out of range for {len} {resource} resources")]
    IndexOutOfRange {
        resource: String,
        index: usize,
        len: usize,
    },

    #[error("{resource} has no relation or nested resource named '{name}'")]
    UnknownRelation { resource: String, name: String },

    /// The client that produced a resource has been dropped
    #[error("client session for {resource} is no longer available")]
    SessionClosed { resource: String },

    #[error("{resource}: request failed with HTTP {status}")]
    Http { resource: String, status: u16 },

    #[error("{resource}: unexpected response: {reason}")]
    UnexpectedResponse { resource: String, reason: String },

    #[error("failed to read upload {path}: {source}")]
    Upload {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing configuration: {0}")]
    Config(String),

    #[error("invalid API version '{0}'")]
    InvalidVersion(String),

    #[error("invalid Redmine URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a validation error raised before any request is sent
    pub(crate) fn local_validation(resource: &str, message: impl Into<String>) -> Self {
        Error::Validation {
            resource: resource.to_string(),
            status: None,
            messages: vec![message.into()],
        }
    }

    /// HTTP status attached to this error, if it came from a server response
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Validation { status, .. } => *status,
            Error::Http { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
