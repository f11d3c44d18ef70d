//! Operation registry.
//!
//! Maps a descriptor's type tag to the factory that rebuilds the operation.
//! Unknown tags are not an error: `reconstruct` returns `Ok(None)` so recipes
//! written against a newer catalog still replay the steps this build knows.
//!
//! The process-wide registry is filled once by [`initialize`] or
//! [`initialize_with`] and is read-only afterwards.

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

use super::{builtin, Descriptor, Operation, OperationFactory};
use crate::error::{EngineError, EngineResult, OperationResult};
use crate::logs::log_info;
use crate::project::Project;

static REGISTRY: OnceCell<Arc<OperationRegistry>> = OnceCell::new();

/// Tag to factory mapping.
#[derive(Default)]
pub struct OperationRegistry {
    factories: HashMap<String, Box<dyn OperationFactory>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the builtin catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: OperationFactory + 'static,
    {
        self.factories.insert(tag.to_string(), Box::new(factory));
    }

    pub fn register_fn<F>(&mut self, tag: &str, factory_fn: F)
    where
        F: Fn(&Project, &Descriptor) -> OperationResult<Box<dyn Operation>> + Send + Sync + 'static,
    {
        struct FnFactory<F> {
            f: F,
        }

        impl<F> OperationFactory for FnFactory<F>
        where
            F: Fn(&Project, &Descriptor) -> OperationResult<Box<dyn Operation>> + Send + Sync,
        {
            fn create(&self, project: &Project, descriptor: &Descriptor) -> OperationResult<Box<dyn Operation>> {
                (self.f)(project, descriptor)
            }
        }

        self.factories
            .insert(tag.to_string(), Box::new(FnFactory { f: factory_fn }));
    }

    /// Register an operation whose parameters deserialize straight from the payload.
    pub fn register_params<T>(&mut self, tag: &str)
    where
        T: Operation + DeserializeOwned + 'static,
    {
        self.register_fn(tag, |_project, descriptor| {
            let op: T = descriptor.parse_params()?;
            Ok(Box::new(op))
        });
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Rebuild the operation a descriptor describes.
    ///
    /// `Ok(None)` for an unknown tag, `Err` when the tag is known but the
    /// payload does not fit.
    pub fn reconstruct(
        &self,
        project: &Project,
        descriptor: &Descriptor,
    ) -> OperationResult<Option<Box<dyn Operation>>> {
        match self.factories.get(&descriptor.kind) {
            Some(factory) => factory.create(project, descriptor).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// =============================================================================
// Process-wide registry
// =============================================================================

/// Initialize the process-wide registry with the builtin catalog.
pub fn initialize() -> Arc<OperationRegistry> {
    initialize_with(|_| {})
}

/// Initialize the process-wide registry, letting plugins register extra kinds.
///
/// Only the first call registers anything; later calls return the existing
/// registry and `plugins` is not invoked.
pub fn initialize_with<F>(plugins: F) -> Arc<OperationRegistry>
where
    F: FnOnce(&mut OperationRegistry),
{
    REGISTRY
        .get_or_init(|| {
            let mut registry = OperationRegistry::with_builtins();
            plugins(&mut registry);
            log_info(format!("Registered {} operation kinds", registry.len()));
            Arc::new(registry)
        })
        .clone()
}

/// The process-wide registry, or `Uninitialized` before startup.
pub fn global() -> EngineResult<Arc<OperationRegistry>> {
    REGISTRY.get().cloned().ok_or(EngineError::Uninitialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use crate::operations::{Process, ProcessOptions};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Noop {
        #[serde(default)]
        note: String,
    }

    impl Operation for Noop {
        fn kind(&self) -> &str {
            "noop"
        }

        fn create_process(&self, _project: &Project, _options: &ProcessOptions) -> OperationResult<Box<dyn Process>> {
            Err(OperationError::invalid("note", self.note.clone()))
        }
    }

    fn descriptor(value: serde_json::Value) -> Descriptor {
        Descriptor::from_value(&value).unwrap()
    }

    #[test]
    fn test_unknown_tag_is_absent() {
        let registry = OperationRegistry::new();
        let result = registry.reconstruct(&Project::new(), &descriptor(json!({"type": "does-not-exist"})));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_register_params() {
        let mut registry = OperationRegistry::new();
        registry.register_params::<Noop>("noop");

        let op = registry
            .reconstruct(&Project::new(), &descriptor(json!({"type": "noop", "note": "hi"})))
            .unwrap()
            .unwrap();
        assert_eq!(op.kind(), "noop");
    }

    #[test]
    fn test_malformed_payload_for_known_tag() {
        let mut registry = OperationRegistry::new();
        registry.register_params::<Noop>("noop");

        let err = registry
            .reconstruct(&Project::new(), &descriptor(json!({"type": "noop", "note": 5})))
            .unwrap_err();
        assert!(matches!(err, OperationError::MalformedDescriptor { .. }));
    }

    #[test]
    fn test_register_fn_sees_project() {
        let mut registry = OperationRegistry::new();
        registry.register_fn("needs-columns", |project, descriptor| {
            if project.column_count() == 0 {
                return Err(OperationError::malformed(&descriptor.kind, "empty project"));
            }
            Ok(Box::new(Noop { note: String::new() }))
        });

        let d = descriptor(json!({"type": "needs-columns"}));
        assert!(registry.reconstruct(&Project::new(), &d).is_err());

        let project = Project::with_columns(["a"]).unwrap();
        assert!(registry.reconstruct(&project, &d).unwrap().is_some());
    }

    #[test]
    fn test_kinds_sorted() {
        let registry = OperationRegistry::with_builtins();
        let kinds = registry.kinds();

        assert!(kinds.windows(2).all(|w| w[0] <= w[1]));
        assert!(registry.contains("rename-column"));
        assert!(registry.contains("core/column-rename"));
    }

    #[test]
    fn test_global_registry_initializes_once() {
        let first = initialize();
        let second = initialize_with(|r| r.register_params::<Noop>("late-plugin"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.contains("late-plugin"));
        assert!(global().is_ok());
    }
}
