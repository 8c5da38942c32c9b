//! Error types for chart generation.

use thiserror::Error;

/// Top-level error returned by every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render manifests: {0}")]
    Render(String),
}

/// Problems with the user-supplied configuration. All of them abort
/// generation before any resource is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A supplied resource map lacks one or more of its expected keys
    #[error("{map} is missing required keys: {}", .missing.join(", "))]
    MissingKeys { map: String, missing: Vec<String> },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid URL in {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// Namespace or instance name that is not a DNS-1123 label
    #[error("Invalid {field} '{value}': expected at most 63 lowercase alphanumerics or '-', starting and ending alphanumeric")]
    InvalidName { field: String, value: String },

    #[error("Invalid quantity for {field}: '{value}' (expected e.g. 10Gi, 500Mi)")]
    InvalidQuantity { field: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    ParsingFailed(String),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("No configuration file found in {0}")]
    NotFound(String),
}

impl From<serde_yaml::Error> for ChartError {
    fn from(err: serde_yaml::Error) -> Self {
        ChartError::Render(err.to_string())
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Render(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
