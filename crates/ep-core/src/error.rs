//! Error types for evprep

use thiserror::Error;

/// evprep error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required column is absent from the event table
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A column exists but cannot be read as the requested type
    #[error("column '{column}' has wrong type: expected {expected}, got {actual}")]
    ColumnType {
        /// Column name.
        column: String,
        /// Expected Arrow type description.
        expected: String,
        /// Actual Arrow type.
        actual: String,
    },

    /// Run configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Columnar storage (Arrow / Parquet) error
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
