//! Error types for planning and job configuration.

use thiserror::Error;

/// Errors that can occur while configuring or planning a job.
#[derive(Error, Debug)]
pub enum PlanError {
    /// Job settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A legacy input path that is deliberately unsupported.
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
