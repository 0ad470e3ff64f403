//! Structured error types for the biocatalyzer workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for all biocatalyzer operations.
///
/// Only configuration-level failures surface as errors. Chemistry failures on
/// a single compound, rule or product degrade to empty results instead.
#[derive(Debug, Error)]
pub enum BiocatError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed input data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required column is absent from an input table
    #[error("{table}: missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A configured input path does not exist
    #[error("input not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The output location already holds results from a previous run
    #[error("results already exist at {}; choose a different output path", .0.display())]
    OutputExists(PathBuf),

    /// The worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BiocatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_message_names_table_and_column() {
        let err = BiocatError::MissingColumn {
            table: "rules.tsv".into(),
            column: "InternalID".into(),
        };
        assert_eq!(err.to_string(), "rules.tsv: missing required column 'InternalID'");
    }

    #[test]
    fn output_exists_message_mentions_path() {
        let err = BiocatError::OutputExists(PathBuf::from("/tmp/run1"));
        assert!(err.to_string().contains("/tmp/run1"));
    }

    #[test]
    fn io_errors_convert() {
        fn open() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/nonexistent/biocat/file")?)
        }
        assert!(matches!(open(), Err(BiocatError::Io(_))));
    }
}
