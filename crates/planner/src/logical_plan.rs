use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use textflow_common::{LinkIdentity, OperatorId, Result, TextflowError};

use crate::operator::OperatorDescriptor;

/// Directed edge from a producer operator to a consumer operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorLink {
    pub from: OperatorId,
    pub to: OperatorId,
}

impl OperatorLink {
    pub fn new(from: impl Into<OperatorId>, to: impl Into<OperatorId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn identity(&self) -> LinkIdentity {
        LinkIdentity::new(self.from.clone(), self.to.clone())
    }
}

/// Wire form of a logical plan: a list of descriptors plus a list of links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanSubmission {
    pub operators: Vec<OperatorDescriptor>,
    #[serde(default)]
    pub links: Vec<OperatorLink>,
}

/// Author-level operator graph.
///
/// Operators are keyed by id; link order is preserved because it decides the
/// role of each input of a multi-input operator. Link endpoints are not checked
/// here, that is the validator's first check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlanSubmission", into = "PlanSubmission")]
pub struct LogicalPlan {
    operators: BTreeMap<OperatorId, OperatorDescriptor>,
    links: Vec<OperatorLink>,
}

impl LogicalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operator. Its id must not already be in the plan.
    pub fn add_operator(&mut self, descriptor: OperatorDescriptor) -> Result<()> {
        if self.operators.contains_key(&descriptor.id) {
            return Err(TextflowError::DuplicateOperator(descriptor.id));
        }
        self.operators.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Add a link. The identical edge may only appear once.
    pub fn add_link(&mut self, link: OperatorLink) -> Result<()> {
        if self.links.contains(&link) {
            return Err(TextflowError::DuplicateLink {
                from: link.from,
                to: link.to,
            });
        }
        self.links.push(link);
        Ok(())
    }

    /// Operators sorted by id.
    pub fn operators(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.operators.values()
    }

    pub fn operator(&self, id: &OperatorId) -> Option<&OperatorDescriptor> {
        self.operators.get(id)
    }

    pub fn contains(&self, id: &OperatorId) -> bool {
        self.operators.contains_key(id)
    }

    /// Links in declaration order.
    pub fn links(&self) -> &[OperatorLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let submission: PlanSubmission = serde_json::from_str(json)
            .map_err(|e| TextflowError::InvalidConfig(format!("plan decode failed: {e}")))?;
        Self::try_from(submission)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| TextflowError::InvalidConfig(format!("plan encode failed: {e}")))
    }
}

impl TryFrom<PlanSubmission> for LogicalPlan {
    type Error = TextflowError;

    fn try_from(submission: PlanSubmission) -> Result<Self> {
        let mut plan = LogicalPlan::new();
        for op in submission.operators {
            plan.add_operator(op)?;
        }
        for link in submission.links {
            plan.add_link(link)?;
        }
        Ok(plan)
    }
}

impl From<LogicalPlan> for PlanSubmission {
    fn from(plan: LogicalPlan) -> Self {
        PlanSubmission {
            operators: plan.operators.into_values().collect(),
            links: plan.links,
        }
    }
}
