#![deny(missing_docs)]

//! Execution runtime for validated physical plans.
//!
//! Architecture role:
//! - operator executor contracts and their lifecycle guard
//! - executor factory registry keyed by operator kind tag
//! - shared fan-out connectors and the pull-driven executor tree
//! - incremental (retraction/insertion) result maintenance
//!
//! Key modules:
//! - [`executor`]
//! - [`registry`]
//! - [`connector`]
//! - [`runtime`]
//! - [`incremental`]
//!
//! Feature flags:
//! - none; `NlpEntity` and `PythonUdf` executors are supplied by embedders through the registry.

pub mod catalog;
pub mod connector;
pub mod context;
pub mod executor;
pub mod incremental;
pub mod lifecycle;
mod operators;
pub mod registry;
pub mod runtime;
pub mod stream;

// Re-export only what you want at the crate root (no globs).
pub use catalog::{CatalogSchemas, MemoryCatalog, TableProvider};
pub use connector::{Connector, Endpoint};
pub use context::ExecutionContext;
pub use executor::{
    no_tuples, tuples, Executor, ExecutorArgs, InputEvent, OperatorExecutor, SourceExecutor,
    TupleIter,
};
pub use incremental::{Delta, IncrementalResultEngine};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use registry::{
    deregister_global_executor_factory, global_executor_registry,
    register_global_executor_factory, ExecutorFactory, ExecutorRegistry, FnFactory,
};
pub use runtime::{build_executor_tree, run_to_completion, ConnectorInfo, ExecutorTree, RunOutput};
pub use stream::{MemoryStream, SendableTupleStream, TupleStream};
