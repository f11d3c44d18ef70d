//! Error types for the BatchRefine transform engine.
//!
//! - [`CsvError`] - CSV import errors
//! - [`ProjectError`] - Structural errors raised by the grid model
//! - [`OperationError`] - Descriptor reconstruction and process creation errors
//! - [`ExportError`] - CSV serialization errors
//! - [`EngineError`] - Top-level errors returned by `transform`
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;


// =============================================================================
// CSV Import Errors
// =============================================================================

/// CSV import error with the line it was raised on (0 when not tied to a line).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line}: {message}")]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

// =============================================================================
// Project Errors
// =============================================================================

/// Errors raised by the structural primitives of [`crate::project::Project`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    /// A row or column index does not exist.
    #[error("{kind} index {index} out of bounds (len {len})")]
    OutOfBounds {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// A column with the same name already exists.
    #[error("Column already exists: {0}")]
    DuplicateColumn(String),

    /// A column name lookup failed.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A row was supplied with the wrong number of cells.
    #[error("Row has {actual} cells, project has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
}

impl ProjectError {
    pub(crate) fn row(index: usize, len: usize) -> Self {
        ProjectError::OutOfBounds { kind: "Row", index, len }
    }

    pub(crate) fn column(index: usize, len: usize) -> Self {
        ProjectError::OutOfBounds { kind: "Column", index, len }
    }
}

// =============================================================================
// Operation Errors
// =============================================================================

/// Errors while turning a descriptor into a runnable process.
///
/// Every variant is scoped to a single descriptor: the pipeline logs it,
/// records it in the report and moves on to the next step.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The descriptor payload does not fit the schema of its operation kind.
    #[error("Malformed descriptor for '{kind}': {message}")]
    MalformedDescriptor { kind: String, message: String },

    /// The operation references a column the project does not have.
    #[error("Column '{0}' does not exist")]
    MissingColumn(String),

    /// A parameter is well-formed but unusable against the current project.
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// A structural primitive failed.
    #[error(transparent)]
    Project(#[from] ProjectError),
}

impl OperationError {
    pub fn malformed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        OperationError::MalformedDescriptor {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        OperationError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors during CSV serialization of a project.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV writer error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to flush or write the output.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// The project violates the row width invariant.
    #[error("Project is inconsistent: {0}")]
    Inconsistent(#[from] ProjectError),
}

// =============================================================================
// Engine Errors (top-level)
// =============================================================================

/// Top-level errors of a transform run.
///
/// Only fatal conditions surface here. Per-descriptor failures are recovered
/// inside the apply loop and reported through
/// [`crate::transform::TransformReport`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// `transform` was called before the operation registry was initialized.
    #[error("Engine needs to be initialized")]
    Uninitialized,

    /// The input could not be parsed into a project.
    #[error("Failed to import {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: CsvError,
    },

    /// The final project could not be serialized.
    #[error("Failed to export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: ExportError,
    },

    /// The operations document is not a JSON array of descriptors.
    #[error("Malformed operations input: {0}")]
    MalformedInput(String),

    /// Failed to read or write a file owned by the caller.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV import.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for project primitives.
pub type ProjectResult<T> = Result<T, ProjectError>;

/// Result type for operation reconstruction and process creation.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for CSV export.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for engine runs.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ProjectError -> OperationError
        let project_err = ProjectError::column(4, 2);
        let op_err: OperationError = project_err.into();
        assert!(op_err.to_string().contains("Column index 4"));

        // ProjectError -> ExportError
        let export_err: ExportError = ProjectError::RowWidth { expected: 2, actual: 3 }.into();
        assert!(export_err.to_string().contains("inconsistent"));
    }

    #[test]
    fn test_csv_error_format() {
        let err = CsvError::new(5, "unterminated quote");
        assert_eq!(err.to_string(), "Line 5: unterminated quote");
    }

    #[test]
    fn test_import_error_names_file() {
        let err = EngineError::Import {
            path: PathBuf::from("/data/input.csv"),
            source: CsvError::new(1, "Empty CSV file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/input.csv"));
        assert!(msg.contains("Empty CSV file"));
    }

    #[test]
    fn test_malformed_format() {
        let err = OperationError::malformed("rename-column", "missing field `to`");
        let msg = err.to_string();
        assert!(msg.contains("rename-column"));
        assert!(msg.contains("missing field `to`"));
    }
}
