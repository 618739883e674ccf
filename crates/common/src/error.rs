use std::fmt;

use thiserror::Error;

use crate::ids::OperatorId;

/// Which side of an operator an arity violation was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AritySide {
    /// Incoming links.
    Input,
    /// Outgoing links.
    Output,
}

impl fmt::Display for AritySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AritySide::Input => write!(f, "input"),
            AritySide::Output => write!(f, "output"),
        }
    }
}

/// Structural plan violations found by the plan validator.
///
/// The validator stops at the first violation, so a plan with several
/// problems reports only the kind checked earliest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A link references an operator id that is not part of the plan.
    #[error("link {from} -> {to} references unknown operator {missing}")]
    UnknownOperator {
        /// Link producer id.
        from: OperatorId,
        /// Link consumer id.
        to: OperatorId,
        /// The endpoint that could not be resolved.
        missing: OperatorId,
    },

    /// The link set contains a directed cycle (self-loops included).
    #[error("operator graph contains a cycle through {operator}")]
    Cycle {
        /// One operator that participates in the cycle.
        operator: OperatorId,
    },

    /// The undirected link graph has more than one connected component.
    #[error("operator {operator} is disconnected from the rest of the graph")]
    DisconnectedGraph {
        /// An operator outside the component of the first operator.
        operator: OperatorId,
    },

    /// Link count on one side of an operator disagrees with its declared arity.
    #[error("operator {operator} declares {side} arity {declared} but has {actual} {side} links")]
    Arity {
        /// Offending operator.
        operator: OperatorId,
        /// Side on which the mismatch was found.
        side: AritySide,
        /// Declared arity.
        declared: usize,
        /// Actual link count.
        actual: usize,
    },

    /// No operator with output arity 0.
    #[error("plan has no sink operator")]
    NoSink,

    /// More than one operator with output arity 0.
    #[error("plan has more than one sink operator: {}", join_ids(.sinks))]
    MultipleSink {
        /// All sink ids, sorted.
        sinks: Vec<OperatorId>,
    },

    /// No operator with input arity 0, or an operator not downstream of any source.
    #[error("plan has no source operator feeding {operator}")]
    NoSource {
        /// An operator that no source reaches.
        operator: OperatorId,
    },
}

fn join_ids(ids: &[OperatorId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Canonical textflow error taxonomy used across crates.
///
/// Classification guidance:
/// - [`TextflowError::Validation`]: structural plan problems; fix the plan and resubmit
/// - [`TextflowError::UnknownAttribute`] / [`TextflowError::DuplicateAttribute`]:
///   operator configuration rejected during schema inference
/// - [`TextflowError::FieldType`] / [`TextflowError::ExecutorState`] /
///   [`TextflowError::Execution`]: runtime failures; the failing executor cannot continue
/// - [`TextflowError::Unsupported`]: a well-formed request for something not available
///   in this build (for example an operator kind without a registered executor)
#[derive(Debug, Error)]
pub enum TextflowError {
    /// Structural plan violation.
    #[error("invalid plan: {0}")]
    Validation(#[from] ValidationError),

    /// An operator id was added to a logical plan twice.
    #[error("duplicate operator id: {0}")]
    DuplicateOperator(OperatorId),

    /// The identical link was added to a logical plan twice.
    #[error("duplicate link: {from} -> {to}")]
    DuplicateLink {
        /// Link producer id.
        from: OperatorId,
        /// Link consumer id.
        to: OperatorId,
    },

    /// Configuration references an attribute the input schema does not have.
    #[error("operator {operator}: unknown attribute `{attribute}`")]
    UnknownAttribute {
        /// Operator whose configuration failed.
        operator: OperatorId,
        /// Missing attribute.
        attribute: String,
    },

    /// Configuration would produce an attribute name that already exists.
    #[error("operator {operator}: attribute `{attribute}` already exists")]
    DuplicateAttribute {
        /// Operator whose configuration failed.
        operator: OperatorId,
        /// Colliding attribute.
        attribute: String,
    },

    /// Invalid or inconsistent configuration.
    ///
    /// Examples:
    /// - malformed plan submission JSON
    /// - invalid regex pattern or zero top-n
    /// - training UDF requesting more than one worker
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field value did not have the type its schema declares.
    #[error("attribute `{attribute}`: expected {expected}, found {actual}")]
    FieldType {
        /// Attribute being read or built.
        attribute: String,
        /// Declared type.
        expected: String,
        /// Observed type.
        actual: String,
    },

    /// An executor was driven outside its `Unopened -> Open -> Closed` lifecycle.
    #[error("operator {operator}: cannot {action} while {state}")]
    ExecutorState {
        /// Operator id of the executor.
        operator: OperatorId,
        /// Lifecycle state the executor was in.
        state: &'static str,
        /// Attempted action.
        action: &'static str,
    },

    /// Other runtime failures after planning succeeded.
    #[error("execution error: {0}")]
    Execution(String),

    /// Valid request for a feature not available in this build.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl TextflowError {
    /// Stable label for the error cause, suitable for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TextflowError::Validation(v) => match v {
                ValidationError::UnknownOperator { .. } => "unknown_operator",
                ValidationError::Cycle { .. } => "cycle",
                ValidationError::DisconnectedGraph { .. } => "disconnected_graph",
                ValidationError::Arity { .. } => "arity",
                ValidationError::NoSink => "no_sink",
                ValidationError::MultipleSink { .. } => "multiple_sink",
                ValidationError::NoSource { .. } => "no_source",
            },
            TextflowError::DuplicateOperator(_) => "duplicate_operator",
            TextflowError::DuplicateLink { .. } => "duplicate_link",
            TextflowError::UnknownAttribute { .. } => "unknown_attribute",
            TextflowError::DuplicateAttribute { .. } => "duplicate_attribute",
            TextflowError::InvalidConfig(_) => "invalid_config",
            TextflowError::FieldType { .. } => "field_type",
            TextflowError::ExecutorState { .. } => "executor_state",
            TextflowError::Execution(_) => "execution",
            TextflowError::Unsupported(_) => "unsupported",
        }
    }
}

/// Standard textflow result alias.
pub type Result<T> = std::result::Result<T, TextflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_names_operator_and_side() {
        let err = TextflowError::from(ValidationError::Arity {
            operator: OperatorId::from("tuple sink"),
            side: AritySide::Input,
            declared: 1,
            actual: 2,
        });
        assert_eq!(err.kind(), "arity");
        assert_eq!(
            err.to_string(),
            "invalid plan: operator tuple sink declares input arity 1 but has 2 input links"
        );
    }

    #[test]
    fn multiple_sink_lists_ids() {
        let err = ValidationError::MultipleSink {
            sinks: vec![OperatorId::from("a"), OperatorId::from("b")],
        };
        assert_eq!(err.to_string(), "plan has more than one sink operator: a, b");
    }
}
