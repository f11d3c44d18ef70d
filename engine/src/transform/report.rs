//! Run report.
//!
//! Per-step recovery is part of the contract: every descriptor of a recipe
//! ends up either in [`TransformReport::applied`] or in
//! [`TransformReport::skipped`], keyed by its position in the recipe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::logs::log_info;
use crate::project::Project;

/// Lifecycle of one run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Uninitialized,
    Loaded,
    Transforming,
    Exported,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Uninitialized => "uninitialized",
            RunState::Loaded => "loaded",
            RunState::Transforming => "transforming",
            RunState::Exported => "exported",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a descriptor did not change the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum SkipReason {
    /// No factory is registered for the tag
    UnknownOperationKind,
    /// The descriptor or its parameters did not fit the project
    MalformedDescriptor(String),
    /// The process was created but failed while running
    ProcessFailed(String),
}

impl SkipReason {
    /// Unknown kinds are expected when replaying recipes from a richer catalog.
    pub fn is_failure(&self) -> bool {
        !matches!(self, SkipReason::UnknownOperationKind)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownOperationKind => f.write_str("unknown operation kind"),
            SkipReason::MalformedDescriptor(msg) => write!(f, "malformed descriptor: {}", msg),
            SkipReason::ProcessFailed(msg) => write!(f, "process failed: {}", msg),
        }
    }
}

/// A step that ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedStep {
    pub index: usize,
    pub kind: String,
    pub description: String,
}

/// A step that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStep {
    pub index: usize,
    /// `None` when the descriptor carried no usable tag
    pub kind: Option<String>,
    pub reason: SkipReason,
}

/// Shape of a project at a point in the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridShape {
    pub rows: usize,
    pub columns: Vec<String>,
}

impl GridShape {
    pub fn of(project: &Project) -> Self {
        Self {
            rows: project.row_count(),
            columns: project.column_names().into_iter().map(String::from).collect(),
        }
    }
}

/// Diagnostics for one transform run.
#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Input file, absent for in-memory runs
    pub source: Option<PathBuf>,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,

    pub input: GridShape,
    pub output: GridShape,

    pub applied: Vec<AppliedStep>,
    pub skipped: Vec<SkippedStep>,
}

impl TransformReport {
    pub fn new(source: Option<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Uninitialized,
            started_at: Utc::now(),
            finished_at: None,
            source,
            encoding: None,
            delimiter: None,
            input: GridShape::default(),
            output: GridShape::default(),
            applied: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Move to `next`. Earlier or equal states are ignored.
    pub fn advance(&mut self, next: RunState) {
        if next <= self.state {
            return;
        }
        log_info(format!("Run {}: {} -> {}", short_id(&self.run_id), self.state, next));
        self.state = next;
        if next == RunState::Done {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn applied(&mut self, index: usize, kind: impl Into<String>, description: impl Into<String>) {
        self.applied.push(AppliedStep {
            index,
            kind: kind.into(),
            description: description.into(),
        });
    }

    pub fn skip(&mut self, index: usize, kind: Option<String>, reason: SkipReason) {
        self.skipped.push(SkippedStep { index, kind, reason });
    }

    /// Skipped steps other than unknown kinds.
    pub fn failures(&self) -> impl Iterator<Item = &SkippedStep> {
        self.skipped.iter().filter(|s| s.reason.is_failure())
    }

    /// True when every known step ran.
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// One-line summary for the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{} applied, {} skipped ({} failed); {} rows x {} columns -> {} rows x {} columns",
            self.applied.len(),
            self.skipped.len(),
            self.failures().count(),
            self.input.rows,
            self.input.columns.len(),
            self.output.rows,
            self.output.columns.len(),
        )
    }

    pub(crate) fn sort_steps(&mut self) {
        self.applied.sort_by_key(|s| s.index);
        self.skipped.sort_by_key(|s| s.index);
    }
}

fn short_id(id: &Uuid) -> String {
    id.simple().to_string().chars().take(8).collect()
}
