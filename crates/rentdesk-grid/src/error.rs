// ── Grid errors ──
//
// Rendering and state changes never fail. `GridConfigError` surfaces only
// from `GridConfig::validate`, for callers that want to reject bad
// configuration up front instead of letting `Grid::mount` normalize it.
// `ExportError` comes from writing exports to a caller's sink.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridConfigError {
    #[error("duplicate column key '{key}'")]
    DuplicateColumn { key: String },

    #[error("page size must be at least 1")]
    ZeroPageSize,

    #[error("page size option must be at least 1")]
    ZeroPageSizeOption,

    #[error("search field '{field}' does not look like a field path")]
    InvalidSearchField { field: String },
}

/// Failure writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
