use thiserror::Error;

use crate::store::StoreError;

/// Fatal faults. Any of these aborts the run with a non-zero exit.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("source collection `{collection}` unavailable")]
    SourceUnavailable {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("destination collection `{collection}` unavailable")]
    DestinationUnavailable {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("batch #{batch} ({size} writes) to `{collection}` failed to commit after {attempts} attempt(s)")]
    BatchCommitFailed {
        collection: String,
        batch: usize,
        size: usize,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("operator console unavailable")]
    ConsoleUnavailable(#[source] std::io::Error),
}

/// A single source document could not be mapped. The record is skipped and counted as failed.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("document body is {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub(crate) fn json_kind(v: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
