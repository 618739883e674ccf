//! Executor factories keyed by operator kind tag.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use textflow_common::{Result, TextflowError};

use crate::executor::{Executor, ExecutorArgs};
use crate::operators;

/// Creates executor instances for one operator kind.
pub trait ExecutorFactory: Send + Sync {
    /// Operator kind tag this factory serves (see `OperatorKind::tag`).
    fn name(&self) -> &str;

    /// Instantiate one executor. Called once per worker.
    fn create(&self, args: ExecutorArgs<'_>) -> Result<Executor>;
}

/// Factory backed by a plain function.
pub struct FnFactory<F> {
    name: String,
    f: F,
}

impl<F> FnFactory<F>
where
    F: Fn(ExecutorArgs<'_>) -> Result<Executor> + Send + Sync,
{
    /// Wrap `f` as the factory for kind `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> ExecutorFactory for FnFactory<F>
where
    F: Fn(ExecutorArgs<'_>) -> Result<Executor> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, args: ExecutorArgs<'_>) -> Result<Executor> {
        (self.f)(args)
    }
}

/// Registry of executor factories keyed by operator kind tag.
#[derive(Default)]
pub struct ExecutorRegistry {
    inner: RwLock<HashMap<String, Arc<dyn ExecutorFactory>>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("factories", &self.names())
            .finish()
    }
}

impl ExecutorRegistry {
    /// Registry holding the built-in executors.
    ///
    /// `NlpEntity` and `PythonUdf` have no built-in executor; register one
    /// before running plans that use them.
    pub fn with_builtins() -> Self {
        let registry = Self::default();
        for factory in operators::builtin_factories() {
            registry.register(factory);
        }
        registry
    }

    /// Register or replace a factory.
    ///
    /// Returns `true` when an existing factory with the same name was replaced.
    pub fn register(&self, factory: Arc<dyn ExecutorFactory>) -> bool {
        match self.inner.write() {
            Ok(mut m) => m.insert(factory.name().to_string(), factory).is_some(),
            Err(poisoned) => poisoned
                .into_inner()
                .insert(factory.name().to_string(), factory)
                .is_some(),
        }
    }

    /// Deregister a factory by name.
    ///
    /// Returns `true` when an existing factory was removed.
    pub fn deregister(&self, name: &str) -> bool {
        match self.inner.write() {
            Ok(mut m) => m.remove(name).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(name).is_some(),
        }
    }

    /// Fetch a factory by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExecutorFactory>> {
        self.inner.read().ok()?.get(name).cloned()
    }

    /// Fetch a factory, failing with `Unsupported` when none is registered.
    pub fn require(&self, name: &str) -> Result<Arc<dyn ExecutorFactory>> {
        self.get(name).ok_or_else(|| {
            TextflowError::Unsupported(format!("no executor registered for operator kind {name}"))
        })
    }

    /// List registered factory names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .inner
            .read()
            .map(|m| m.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn global_registry() -> &'static Arc<ExecutorRegistry> {
    static REGISTRY: OnceLock<Arc<ExecutorRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Arc::new(ExecutorRegistry::with_builtins()))
}

/// Return the process-wide registry, seeded with the built-in executors.
pub fn global_executor_registry() -> Arc<ExecutorRegistry> {
    Arc::clone(global_registry())
}

/// Register a factory in the process-wide registry.
///
/// Returns `true` when an existing factory with the same name was replaced.
pub fn register_global_executor_factory(factory: Arc<dyn ExecutorFactory>) -> bool {
    global_registry().register(factory)
}

/// Deregister a factory from the process-wide registry.
///
/// Returns `true` when an existing factory was removed.
pub fn deregister_global_executor_factory(name: &str) -> bool {
    global_registry().deregister(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_reference_operators() {
        let r = ExecutorRegistry::with_builtins();
        let names = r.names();
        for kind in [
            "ScanSource",
            "KeywordSource",
            "KeywordMatcher",
            "RegexMatcher",
            "FuzzyTokenMatcher",
            "Projection",
            "TypeCasting",
            "Join",
            "WordCountPartial",
            "WordCloud",
            "TupleSink",
        ] {
            assert!(names.iter().any(|n| n == kind), "missing {kind}");
        }
        assert!(r.get("NlpEntity").is_none());
        let err = r.require("PythonUdf").err().unwrap();
        assert_eq!(err.kind(), "unsupported");
    }

    #[test]
    fn register_replaces_and_deregister_removes() {
        let r = ExecutorRegistry::default();
        let f = || -> Arc<dyn ExecutorFactory> {
            Arc::new(FnFactory::new("TupleSink", |_args: ExecutorArgs<'_>| {
                Err(TextflowError::Unsupported("test".to_string()))
            }))
        };
        assert!(!r.register(f()));
        assert!(r.register(f()));
        assert!(r.deregister("TupleSink"));
        assert!(!r.deregister("TupleSink"));
    }
}
