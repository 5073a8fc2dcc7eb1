//! Defines the application's primary error type `AppError` and a convenience `Result` alias.
//!
//! Uses the `thiserror` crate for ergonomic error definition and provides `From`
//! implementations to convert common external errors into `AppError` variants.
//! Errors that do not implement `Clone` are wrapped in `Arc` to allow `AppError` to be cloneable.

use std::sync::Arc;
use thiserror::Error;

/// The primary error enumeration for all application-specific errors.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Transport failure or non-success status while reaching a station feed (`reqwest`).
    #[error("Fetch Error: {0}")]
    Fetch(Arc<reqwest::Error>),

    /// The feed body could not be parsed as JSON. Counted as a fetch failure.
    #[error("JSON Parsing Error: {0}")]
    JsonParse(Arc<serde_json::Error>),

    /// The feed parsed as JSON but is not an array of timestamped records.
    #[error("Schema Error: {0}")]
    Schema(String),

    /// A pipeline step found the column-presence invariant violated.
    #[error("Logic Error: {0}")]
    Logic(String),

    /// Coordinates outside the domain of the map projection.
    #[error("Projection Error: {0}")]
    Projection(String),

    /// Invalid pipeline configuration or station registry.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to standard I/O operations.
    #[error("I/O Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Error specific to CLI logic or argument handling.
    #[error("CLI Error: {0}")]
    Cli(String),

    /// Error originating from user interaction prompts (`dialoguer`).
    #[error("Dialoguer Error: {0}")]
    Dialoguer(Arc<dialoguer::Error>),

    /// Error related to progress bar style templating (`indicatif`).
    #[error("Progress Style Template Error: {0}")]
    Template(Arc<indicatif::style::TemplateError>),
}

impl AppError {
    /// Errors that belong to a single station's ingestion. A multi-station run
    /// records them and carries on with the remaining stations.
    pub fn is_station_failure(&self) -> bool {
        matches!(
            self,
            AppError::Fetch(_) | AppError::JsonParse(_) | AppError::Schema(_)
        )
    }

    /// Errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Logic(_))
    }
}

/// A specialized `Result` type using the application's `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// --- From implementations ---

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Fetch(Arc::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(Arc::new(err))
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(err: dialoguer::Error) -> Self {
        AppError::Dialoguer(Arc::new(err))
    }
}

impl From<indicatif::style::TemplateError> for AppError {
    fn from(err: indicatif::style::TemplateError) -> Self {
        AppError::Template(Arc::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonParse(Arc::new(err))
    }
}
