//! Error taxonomy.
//!
//! `SchemaError` is the only error that escapes the generator and the verifier;
//! mismatches are data (see `diff::Diff`) and malformed pattern text is
//! recovered where it is read.

use thiserror::Error;

/// A malformed schema. Non-recoverable for the call that hit it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("`__item` must be specified when __type is array (at `{path}`)")]
    MissingItem { path: String },

    #[error("`__jsonPath` must be specified when __type is ref (at `{path}`)")]
    MissingJsonPath { path: String },

    #[error("unsupported __type `{tag}` (at `{path}`)")]
    UnknownType { tag: String, path: String },

    #[error("`__type` must be a string (at `{path}`)")]
    InvalidTag { path: String },

    #[error("invalid `{attribute}` on __type {tag} (at `{path}`): {reason}")]
    InvalidAttribute {
        tag: &'static str,
        attribute: &'static str,
        path: String,
        reason: String,
    },

    #[error("unsupported string format `{format}` (at `{path}`)")]
    UnknownFormat { format: String, path: String },

    #[error("invalid __jsonPath `{json_path}`: {reason}")]
    InvalidJsonPath { json_path: String, reason: String },

    #[error("cannot generate text for pattern /{pattern}/: {reason}")]
    UngenerablePattern { pattern: String, reason: String },
}

/// Malformed `/body/flags` text or an uncompilable pattern body.
#[derive(Debug, Error)]
pub enum FormatParseError {
    #[error("`{text}` is not in /pattern/flags notation")]
    Notation { text: String },

    #[error("unsupported pattern flag `{flag}`")]
    Flag { flag: char },

    #[error("invalid pattern /{source_text}/: {source}")]
    Regex {
        source_text: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("at JSON path {path} → {source}")]
    Syntax {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of the jq-backed path-query evaluator.
#[derive(Debug, Error)]
pub enum PathQueryError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Runtime(String),
}
