//! High-level pipeline API: import, replay a recipe, export.
//!
//! # Example
//!
//! ```rust,ignore
//! use batchrefine::{EngineOptions, TransformEngine};
//! use std::path::Path;
//!
//! let engine = TransformEngine::new(EngineOptions::from_env()).init();
//! let recipe = batchrefine::load_operations(Path::new("recipe.json"))?;
//!
//! let mut out = Vec::new();
//! let report = engine.transform(Path::new("input.csv"), &recipe, &mut out)?;
//! println!("{}", report.summary());
//! ```

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::report::{GridShape, RunState, SkipReason, TransformReport};
use crate::config::EngineOptions;
use crate::error::{EngineError, EngineResult, ExportError};
use crate::exporter::export;
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::operations::registry::{self, OperationRegistry};
use crate::operations::Descriptor;
use crate::parser::{import_bytes, import_file, ImportResult};
use crate::process::ProcessQueue;
use crate::project::Project;

/// Label used in errors for runs that have no file behind them.
const IN_MEMORY: &str = "<memory>";

/// Result of an in-memory run.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Exported CSV
    pub bytes: Vec<u8>,
    pub report: TransformReport,
}

/// Replays operation recipes against tabular files.
///
/// An engine built with [`TransformEngine::new`] refuses to run until
/// [`TransformEngine::init`] attaches the process-wide registry.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    registry: Option<Arc<OperationRegistry>>,
    options: EngineOptions,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl TransformEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            registry: None,
            options,
        }
    }

    /// Attach the process-wide registry, initializing it on first use.
    pub fn init(mut self) -> Self {
        self.registry = Some(registry::initialize());
        self
    }

    /// Build a ready engine around an explicit registry.
    pub fn with_registry(registry: Arc<OperationRegistry>, options: EngineOptions) -> Self {
        Self {
            registry: Some(registry),
            options,
        }
    }

    fn registry(&self) -> EngineResult<&OperationRegistry> {
        self.registry.as_deref().ok_or(EngineError::Uninitialized)
    }

    /// Import `original`, apply `operations` in order and write CSV to `out`.
    ///
    /// Only a missing registry, an unreadable input or a failing export abort
    /// the run. Problems with individual descriptors end up in the report.
    pub fn transform<W: Write>(
        &self,
        original: &Path,
        operations: &[Value],
        mut out: W,
    ) -> EngineResult<TransformReport> {
        let registry = self.registry()?;
        let mut report = TransformReport::new(Some(original.to_path_buf()));

        log_info(format!("📖 Reading {}...", original.display()));
        let imported = import_file(original, &self.options.import).map_err(|source| EngineError::Import {
            path: original.to_path_buf(),
            source,
        })?;

        let bytes = self.run(registry, imported, operations, &mut report, original)?;

        out.write_all(&bytes)
            .and_then(|()| out.flush())
            .map_err(|source| EngineError::Export {
                path: original.to_path_buf(),
                source: ExportError::Io(source),
            })?;
        report.advance(RunState::Done);

        Ok(report)
    }

    /// Transform `original` into the file at `target`.
    ///
    /// The target is only created once the run succeeded, so a failed import
    /// leaves an existing file untouched.
    pub fn transform_to_file(
        &self,
        original: &Path,
        operations: &[Value],
        target: &Path,
    ) -> EngineResult<TransformReport> {
        let mut buffer = Vec::new();
        let report = self.transform(original, operations, &mut buffer)?;

        fs::write(target, &buffer).map_err(|source| EngineError::Export {
            path: target.to_path_buf(),
            source: ExportError::Io(source),
        })?;
        log_info(format!("💾 Saved to: {}", target.display()));

        Ok(report)
    }

    /// Same as [`transform`](Self::transform) for input already in memory.
    pub fn transform_bytes(&self, input: &[u8], operations: &[Value]) -> EngineResult<TransformOutput> {
        let registry = self.registry()?;
        let mut report = TransformReport::new(None);

        let imported = import_bytes(input, &self.options.import).map_err(|source| EngineError::Import {
            path: PathBuf::from(IN_MEMORY),
            source,
        })?;

        let bytes = self.run(registry, imported, operations, &mut report, Path::new(IN_MEMORY))?;
        report.advance(RunState::Done);

        Ok(TransformOutput { bytes, report })
    }

    /// Apply a recipe to a project the caller imported.
    ///
    /// Fails only when the engine is not initialized.
    pub fn apply_operations(&self, project: &mut Project, operations: &[Value]) -> EngineResult<TransformReport> {
        let registry = self.registry()?;
        let mut report = TransformReport::new(None);

        report.input = GridShape::of(project);
        report.advance(RunState::Loaded);
        apply(registry, &self.options, project, operations, &mut report);
        report.output = GridShape::of(project);

        Ok(report)
    }

    fn run(
        &self,
        registry: &OperationRegistry,
        imported: ImportResult,
        operations: &[Value],
        report: &mut TransformReport,
        target: &Path,
    ) -> EngineResult<Vec<u8>> {
        let ImportResult {
            mut project,
            encoding,
            delimiter,
        } = imported;

        log_success(format!(
            "Loaded {} rows x {} columns (encoding {}, delimiter '{}')",
            project.row_count(),
            project.column_count(),
            encoding,
            format_delimiter(delimiter),
        ));
        report.encoding = Some(encoding);
        report.delimiter = Some(delimiter);
        report.input = GridShape::of(&project);
        report.advance(RunState::Loaded);

        apply(registry, &self.options, &mut project, operations, report);
        report.output = GridShape::of(&project);

        let bytes = export(&project, &self.options.export).map_err(|source| EngineError::Export {
            path: target.to_path_buf(),
            source,
        })?;
        report.advance(RunState::Exported);

        Ok(bytes)
    }
}

/// Reconstruct and queue every descriptor, then drain what is left.
fn apply(
    registry: &OperationRegistry,
    options: &EngineOptions,
    project: &mut Project,
    operations: &[Value],
    report: &mut TransformReport,
) {
    report.advance(RunState::Transforming);
    log_info(format!("🔄 Applying {} operation(s)...", operations.len()));

    let mut queue = ProcessQueue::new();

    for (index, raw) in operations.iter().enumerate() {
        let descriptor = match Descriptor::from_value(raw) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                log_error(format!("Skipping operation {}: {}", index, err));
                report.skip(index, None, SkipReason::MalformedDescriptor(err.to_string()));
                continue;
            }
        };

        let operation = match registry.reconstruct(project, &descriptor) {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                log_info(format!("Skipping unknown operation {} ({})", index, descriptor.kind));
                report.skip(index, Some(descriptor.kind), SkipReason::UnknownOperationKind);
                continue;
            }
            Err(err) => {
                log_error(format!("Error reconstructing operation {} ({}): {}", index, descriptor.label(), err));
                report.skip(index, Some(descriptor.kind), SkipReason::MalformedDescriptor(err.to_string()));
                continue;
            }
        };

        match operation.create_process(project, &options.process) {
            Ok(process) => queue.queue_process(project, index, descriptor.kind, process),
            Err(err) => {
                log_error(format!("Error applying operation {} ({}): {}", index, descriptor.label(), err));
                report.skip(index, Some(descriptor.kind), SkipReason::MalformedDescriptor(err.to_string()));
            }
        }
    }

    queue.drain(project);

    for outcome in queue.take_outcomes() {
        match outcome.result {
            Ok(()) => report.applied(outcome.index, outcome.kind, outcome.description),
            Err(err) => report.skip(outcome.index, Some(outcome.kind), SkipReason::ProcessFailed(err.to_string())),
        }
    }
    report.sort_steps();

    let failed = report.failures().count();
    if failed == 0 {
        log_success(format!("{} operation(s) applied", report.applied.len()));
    } else {
        log_warning(format!(
            "{} operation(s) applied, {} failed",
            report.applied.len(),
            failed
        ));
    }
}

/// Parse a recipe document. It must be a JSON array of descriptors.
pub fn parse_operations(json: &str) -> EngineResult<Vec<Value>> {
    let value: Value = serde_json::from_str(json).map_err(|e| EngineError::MalformedInput(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(items),
        _ => Err(EngineError::MalformedInput(
            "expected a JSON array of operations".to_string(),
        )),
    }
}

/// Read and parse a recipe file.
pub fn load_operations(path: &Path) -> EngineResult<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    parse_operations(&content)
}

/// Run a recipe with the process-wide registry and default options.
pub fn transform<W: Write>(original: &Path, operations: &[Value], out: W) -> EngineResult<TransformReport> {
    let registry = registry::global()?;
    TransformEngine::with_registry(registry, EngineOptions::default()).transform(original, operations, out)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}
