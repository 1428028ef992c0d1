//! Centralized error types for ontograph.

use serde::Serialize;
use thiserror::Error;

/// A failure confined to a single node or relationship record.
///
/// Item errors never abort a run: the coordinator records them next to the
/// item description and moves on to the next record.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ItemError {
    #[error("Malformed record: {detail}")]
    Parse { detail: String },

    #[error("No unique key defined for label '{label}'")]
    MissingKeyDefinition { label: String },

    #[error("Missing value for key property '{property}' of {label} node")]
    MissingKeyValue { label: String, property: String },

    #[error("Endpoint {selector} matched {matches} node(s), expected exactly one")]
    EndpointNotFound { selector: String, matches: usize },

    #[error("Relationship {rel_type} declares discriminator '{property}' but carries no value for it")]
    MissingDiscriminator { rel_type: String, property: String },

    #[error("'{name}' is not a declared {kind}")]
    UndeclaredIdentifier { kind: String, name: String },

    #[error("Invalid identifier '{name}'")]
    InvalidIdentifier { name: String },

    #[error("{item} already exists")]
    AlreadyExists { item: String },

    #[error("Store rejected the write: {detail}")]
    Rejected { detail: String },
}

impl ItemError {
    /// Create a parse error.
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse { detail: detail.into() }
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::MissingKeyDefinition { .. } => "missing_key_definition",
            Self::MissingKeyValue { .. } => "missing_key_value",
            Self::EndpointNotFound { .. } => "endpoint_not_found",
            Self::MissingDiscriminator { .. } => "missing_discriminator",
            Self::UndeclaredIdentifier { .. } => "undeclared_identifier",
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Errors that make a whole input source unusable.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed schema document: {0}")]
    Malformed(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

impl DecodeError {
    /// Create a malformed-document error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
