//! Operations and processes.
//!
//! A recipe step arrives as an opaque JSON [`Descriptor`]: a type tag plus a
//! kind-specific payload. The [`registry`] turns it into a boxed
//! [`Operation`], which in turn binds itself to the current project as a
//! [`Process`] that the queue runs.
//!
//! ```text
//! Descriptor ──registry──▶ Operation ──create_process(&Project)──▶ Process ──run(&mut Project)
//! ```
//!
//! - `registry`: tag to factory mapping, process-wide after startup
//! - `builtin`: the column and row operations shipped with the engine
//! - `values`: per-cell value operations used by several builtins

pub mod builtin;
pub mod registry;
pub mod values;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{OperationError, OperationResult, ProjectResult};
use crate::project::Project;

pub use registry::OperationRegistry;
pub use values::{ValueOp, ValuePipeline};

// =============================================================================
// Descriptor
// =============================================================================

/// One serialized recipe step.
///
/// The tag is read from `"type"`, or from `"op"` for recipes exported by
/// OpenRefine. `"description"` is kept for logs; every other key is the
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub kind: String,
    pub description: Option<String>,
    pub params: Map<String, Value>,
}

impl Descriptor {
    pub fn new(kind: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            description: None,
            params,
        }
    }

    /// Read a descriptor from a JSON value.
    pub fn from_value(value: &Value) -> OperationResult<Self> {
        let mut params = match value {
            Value::Object(obj) => obj.clone(),
            other => {
                return Err(OperationError::malformed(
                    "<unknown>",
                    format!("descriptor must be a JSON object, got {}", type_name(other)),
                ))
            }
        };

        // Both keys leave the payload; the first non-empty string is the tag
        let tags = [params.remove("type"), params.remove("op")];
        let found = tags
            .iter()
            .flatten()
            .find_map(|tag| tag.as_str().filter(|t| !t.is_empty()))
            .map(str::to_string);
        let kind = match found {
            Some(kind) => kind,
            None => {
                return Err(match tags.into_iter().flatten().next() {
                    Some(other) => OperationError::malformed(
                        "<unknown>",
                        format!("type tag must be a non-empty string, got {}", other),
                    ),
                    None => OperationError::malformed("<unknown>", "missing type tag"),
                })
            }
        };

        let description = match params.remove("description") {
            Some(Value::String(d)) => Some(d),
            _ => None,
        };

        Ok(Self {
            kind,
            description,
            params,
        })
    }

    /// Deserialize the payload into a kind-specific parameter struct.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> OperationResult<T> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|e| OperationError::malformed(&self.kind, e.to_string()))
    }

    /// Short label for logs: the description if present, else the tag.
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.kind)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Process options
// =============================================================================

/// Free-form execution options handed to `create_process`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessOptions(Map<String, Value>);

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// A reconstructed recipe step.
///
/// Holds only its parameters. Validation against the project happens in
/// `create_process`, which must not mutate anything.
pub trait Operation: Send + Sync + fmt::Debug {
    /// Type tag this operation was registered under.
    fn kind(&self) -> &str;

    /// Bind the operation to a project.
    fn create_process(
        &self,
        project: &Project,
        options: &ProcessOptions,
    ) -> OperationResult<Box<dyn Process>>;
}

/// A runnable mutation bound to one project.
///
/// `run` consumes the process, so it executes at most once. Implementations
/// check everything they can before the first mutation so a failure leaves
/// the project rectangular.
pub trait Process: Send {
    /// Human readable summary for logs and reports.
    fn describe(&self) -> String;

    /// Immediate processes run as soon as they are queued. Deferred ones wait
    /// for the queue to be drained.
    fn is_immediate(&self) -> bool {
        true
    }

    fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()>;
}

/// Builds an operation from a descriptor.
pub trait OperationFactory: Send + Sync {
    fn create(&self, project: &Project, descriptor: &Descriptor) -> OperationResult<Box<dyn Operation>>;
}
