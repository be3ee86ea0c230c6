//! Error types
//!
//! Provider and connector failures are per-entity and never abort a scope on
//! their own; task failures are per-region and never cancel sibling regions.

use thiserror::Error;

/// A discovery call against the cloud provider failed
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider API returned an error
    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    /// The caller lacks permission for the call
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Network hiccup or throttling; callers may retry
    #[error("Transient provider failure: {0}")]
    Transient(String),

    /// The requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A provider session could not be created
    #[error("Session setup failed: {0}")]
    Session(String),
}

impl ProviderError {
    pub fn api(operation: &str, message: impl Into<String>) -> Self {
        ProviderError::Api {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::api("provider call", format!("{:#}", err))
    }
}

/// A storage backend rejected a read, write or delete
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Backend answered with a non-success HTTP status
    #[error("Storage request failed: {0}")]
    Status(u16),

    #[error("Storage transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid storage payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for ConnectorError {
    fn from(err: anyhow::Error) -> Self {
        ConnectorError::Backend(format!("{:#}", err))
    }
}

/// A per-region task in concurrent mode did not complete
#[derive(Debug, Error)]
pub enum TaskError {
    /// The region traversal returned an error
    #[error("Region {region} failed: {source}")]
    Failed {
        region: String,
        #[source]
        source: ProviderError,
    },

    /// The task panicked or was aborted by the runtime
    #[error("Region {region} task did not finish: {message}")]
    Aborted { region: String, message: String },
}

impl TaskError {
    pub fn region(&self) -> &str {
        match self {
            TaskError::Failed { region, .. } | TaskError::Aborted { region, .. } => region,
        }
    }
}

/// The text is not a well-formed urn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrnParseError {
    #[error("Urn must start with 'urn:': {0}")]
    MissingPrefix(String),

    #[error("Urn has {found} segments, expected 7: {urn}")]
    TooFewSegments { urn: String, found: usize },
}
