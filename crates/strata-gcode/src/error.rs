//! Error types for G-code emission.

use thiserror::Error;

/// Errors that can occur while emitting G-code.
#[derive(Error, Debug)]
pub enum GcodeError {
    /// The output sink rejected a write.
    #[error("failed to write instruction stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for emitter operations.
pub type Result<T> = std::result::Result<T, GcodeError>;
