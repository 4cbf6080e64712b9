//! Error types for the sales report pipeline.
//!
//! Every stage propagates one of these with `?`; the run aborts on the first.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row {row}: {column} value '{value}' does not match format '{format}'")]
    DateParse {
        row: usize,
        column: String,
        value: String,
        format: String,
    },

    #[error("Row {row}: expected at most {expected} fields, found {found}")]
    ExtraFields {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Result type alias for pipeline stages.
pub type ReportResult<T> = Result<T, ReportError>;
