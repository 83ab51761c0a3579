//! Error taxonomy for the lost-items service.
//!
//! Errors are split by the layer that raises them so callers can decide,
//! per layer, whether a failure is recoverable for the current item or fatal
//! for the whole scheduled run.

use thiserror::Error;

/// Errors raised by a catalog client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Login against the catalog failed or returned no token.
    #[error("Catalog authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The HTTP request could not be sent or completed.
    #[error("Catalog request failed: {0}")]
    RequestFailed(String),

    /// The catalog answered with a status we do not handle.
    #[error("Catalog returned status {status} for {path}: {body}")]
    UnexpectedStatus {
        /// Request path
        path: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("Catalog response could not be decoded: {0}")]
    DecodeFailed(String),
}

/// Errors raised by a workflow-service client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The HTTP request could not be sent or completed.
    #[error("Workflow request failed: {0}")]
    RequestFailed(String),

    /// The workflow service answered with a status we do not handle.
    #[error("Workflow service returned status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The response body was not a purchase request.
    #[error("Workflow response could not be decoded: {0}")]
    DecodeFailed(String),
}

/// A catalog record could not be turned into a domain value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A required field is absent or null.
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present with the wrong JSON type.
    #[error("Field `{field}` has an unexpected type (expected {expected})")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Expected JSON type
        expected: &'static str,
    },

    /// The payload is not a JSON object.
    #[error("Record is not a JSON object")]
    NotAnObject,
}

/// Failures while driving an item through its lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A catalog call failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A workflow call failed.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A catalog record was malformed.
    #[error("Malformed {record} record: {source}")]
    Malformed {
        /// Kind of record (item, holding, instance)
        record: &'static str,
        /// Underlying parse failure
        source: ParseError,
    },

    /// The catalog refused a full-record update.
    #[error("Catalog rejected update of {path}")]
    WriteRejected {
        /// Path of the rejected PUT
        path: String,
    },
}

/// Configuration could not be read or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration from {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// I/O failure
        source: std::io::Error,
    },

    /// The configuration document is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A value is present but unusable.
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Result alias for workflow operations.
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
