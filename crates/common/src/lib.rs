//! Shared configuration, error types, IDs, the schema/tuple model and metrics
//! primitives for textflow crates.
//!
//! Architecture role:
//! - defines engine configuration passed from the orchestration layer
//! - provides the common [`TextflowError`] / [`Result`] contracts
//! - hosts the row model every operator reads and writes
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]
//! - [`metrics`]
//! - [`progressive`]
//! - [`schema`]
//! - [`tuple`]

pub mod config;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod progressive;
pub mod schema;
pub mod tuple;

pub use config::EngineConfig;
pub use error::{AritySide, Result, TextflowError, ValidationError};
pub use ids::*;
pub use metrics::{global_metrics, MetricsRegistry};
pub use schema::{Attribute, AttributeType, Schema, SchemaBuilder, SchemaRef};
pub use tuple::{Field, Span, Tuple};
