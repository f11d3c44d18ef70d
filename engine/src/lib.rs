//! # BatchRefine - replay data-cleaning recipes on CSV files
//!
//! A recipe is an ordered list of operation descriptors captured once
//! (for example exported from an interactive session). The engine loads a
//! file into a [`Project`], rebuilds each descriptor through the
//! [`OperationRegistry`], runs the resulting processes in order and writes
//! the final grid back out as CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│  Importer   │────▶│   Project   │────▶│  Exporter   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ ▲ processes │     │    (CSV)    │
//! └─────────────┘     └─────────────┘     └─┼───────────┘     └─────────────┘
//!                                           │
//!                     recipe ──▶ registry ──┘
//! ```
//!
//! Unknown operation kinds are skipped and a failing step never aborts the
//! run; both end up in the [`TransformReport`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchrefine::{parse_operations, EngineOptions, TransformEngine};
//! use std::path::Path;
//!
//! let engine = TransformEngine::new(EngineOptions::default()).init();
//! let recipe = parse_operations(r#"[{"type": "rename-column", "from": "age", "to": "years"}]"#)?;
//! let report = engine.transform(Path::new("people.csv"), &recipe, std::io::stdout())?;
//! eprintln!("{}", report.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`project`] - Tabular grid operations mutate
//! - [`parser`] - CSV import with auto-detection
//! - [`exporter`] - CSV export
//! - [`operations`] - Operation traits, registry and builtin catalog
//! - [`process`] - Ordered process queue
//! - [`transform`] - Pipeline and run report
//! - [`config`] - Engine options
//! - [`logs`] - Log broadcasting

// Core modules
pub mod error;
pub mod project;

// Import / export
pub mod exporter;
pub mod parser;

// Operations
pub mod operations;
pub mod process;

// Pipeline
pub mod config;
pub mod transform;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError,
    EngineError,
    EngineResult,
    ExportError,
    OperationError,
    ProjectError,
};

// =============================================================================
// Re-exports - Project
// =============================================================================

pub use project::{Cell, Column, ColumnType, Project, Row};

// =============================================================================
// Re-exports - Import / Export
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    import_bytes,
    import_file,
    ImportOptions,
    ImportResult,
};

pub use exporter::{export, export_to, ExportOptions};

// =============================================================================
// Re-exports - Operations
// =============================================================================

pub use operations::{
    registry,
    values::operations_description,
    Descriptor,
    Operation,
    OperationFactory,
    OperationRegistry,
    Process,
    ProcessOptions,
    ValueOp,
    ValuePipeline,
};

pub use process::{ProcessOutcome, ProcessQueue};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::EngineOptions;

pub use transform::{
    load_operations,
    parse_operations,
    transform,
    AppliedStep,
    GridShape,
    RunState,
    SkipReason,
    SkippedStep,
    TransformEngine,
    TransformOutput,
    TransformReport,
};
