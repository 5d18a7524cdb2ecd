//! Error types for pgshift

use thiserror::Error;

/// Result type alias for pgshift operations
pub type Result<T> = std::result::Result<T, PgShiftError>;

/// Main error type for pgshift
///
/// Database and object-store failures are carried as strings, converted at
/// the call site, so this crate stays free of driver types.
#[derive(Error, Debug)]
pub enum PgShiftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid transfer configuration: {0}")]
    Configuration(String),

    #[error("Target table '{0}' does not exist in the warehouse")]
    TargetNotFound(String),

    #[error("Source extraction failed: {0}")]
    Extraction(String),

    #[error("Upload of '{key}' failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("Load transaction for batch {batch} failed: {reason}")]
    Load { batch: usize, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl PgShiftError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a target-not-found error for a warehouse table
    pub fn target_not_found(table: impl Into<String>) -> Self {
        Self::TargetNotFound(table.into())
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create an upload error for a specific object key
    pub fn upload(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a load error for a specific batch (1-based)
    pub fn load(batch: usize, reason: impl Into<String>) -> Self {
        Self::Load {
            batch,
            reason: reason.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an object store error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an unknown error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }
}
