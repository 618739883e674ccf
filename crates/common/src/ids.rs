//! Typed identifiers shared by the planner and the execution runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator identifier, unique within one logical plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(
    /// Raw id as authored.
    pub String,
);

impl OperatorId {
    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OperatorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Connector identifier, an index into a physical plan's connector arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectorId(
    /// Raw arena index.
    pub usize,
);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connector-{}", self.0)
    }
}

/// Identity of a directed link between two operators.
///
/// Runtime input events carry this so an executor with several inputs can
/// tell which one a tuple or an exhaustion marker arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkIdentity {
    /// Producer operator.
    pub from: OperatorId,
    /// Consumer operator.
    pub to: OperatorId,
}

impl LinkIdentity {
    /// Create a link identity.
    pub fn new(from: impl Into<OperatorId>, to: impl Into<OperatorId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for LinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
