//! Schema and registry errors.

use thiserror::Error;

/// Errors raised while turning OpenAPI documents into callable functions.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The document is not valid JSON.
    #[error("Failed to parse OpenAPI document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but is missing something a tool source needs.
    #[error("Invalid OpenAPI document: {0}")]
    Invalid(String),

    /// No registered document exposes a function with this name.
    #[error("Function {0} not found in any schema")]
    FunctionNotFound(String),
}
