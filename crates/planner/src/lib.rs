//! Logical plans, structural validation, schema inference and physical
//! planning for textflow workflows.
//!
//! Architecture role:
//! - accepts plan submissions (operator descriptors plus links)
//! - proves them to be single-sink DAGs before anything runs
//! - lowers them to a sink-rooted tree with shared fan-out connectors
//!
//! Key modules:
//! - [`logical_plan`]
//! - [`validator`]
//! - [`analyzer`]
//! - [`physical_planner`]
//! - [`explain`]

pub mod analyzer;
pub mod explain;
pub mod logical_plan;
pub mod operator;
pub mod physical_plan;
pub mod physical_planner;
pub mod validator;

pub use analyzer::{infer_schemas, output_schema, SchemaProvider};
pub use explain::{explain_logical, explain_physical};
pub use logical_plan::*;
pub use operator::*;
pub use physical_plan::*;
pub use physical_planner::{create_physical_plan, PhysicalPlannerConfig};
pub use validator::{validate, ValidatedPlan};
