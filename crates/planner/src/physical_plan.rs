use serde::{Deserialize, Serialize};
use textflow_common::{ConnectorId, LinkIdentity, OperatorId};

use crate::operator::OperatorDescriptor;

/// Executable shape of a validated plan.
///
/// `root` is the sink's node; every other operator is either embedded in the
/// tree under its single consumer, or is the producer of exactly one connector
/// in `connectors`. Connectors are referenced by index, never duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPlan {
    /// Sink node.
    pub root: PhysicalNode,
    /// Connector arena, indexed by [`ConnectorId`].
    #[serde(default)]
    pub connectors: Vec<ConnectorSpec>,
}

impl PhysicalPlan {
    pub fn connector(&self, id: ConnectorId) -> Option<&ConnectorSpec> {
        self.connectors.get(id.0)
    }

    /// Every node in the plan: the root tree first, then each connector's producer tree.
    pub fn nodes(&self) -> Vec<&PhysicalNode> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        for c in &self.connectors {
            c.producer.collect(&mut out);
        }
        out
    }

    pub fn node(&self, id: &OperatorId) -> Option<&PhysicalNode> {
        self.nodes().into_iter().find(|n| &n.operator.id == id)
    }

    /// Connector fed by `producer`, if that operator fans out.
    pub fn connector_for(&self, producer: &OperatorId) -> Option<&ConnectorSpec> {
        self.connectors
            .iter()
            .find(|c| &c.producer.operator.id == producer)
    }
}

/// One operator of the physical plan together with how it receives input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalNode {
    /// Operator id and configuration.
    pub operator: OperatorDescriptor,
    /// Parallel executor instances.
    pub workers: usize,
    /// Inputs in declared link order.
    #[serde(default)]
    pub inputs: Vec<PhysicalInput>,
}

impl PhysicalNode {
    pub fn id(&self) -> &OperatorId {
        &self.operator.id
    }

    /// Nodes embedded directly under this one (connector producers excluded).
    pub fn children(&self) -> Vec<&PhysicalNode> {
        self.inputs
            .iter()
            .filter_map(|i| match i {
                PhysicalInput::Direct { node, .. } => Some(node.as_ref()),
                PhysicalInput::Endpoint { .. } => None,
            })
            .collect()
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a PhysicalNode>) {
        out.push(self);
        for c in self.children() {
            c.collect(out);
        }
    }
}

/// How one input link of a node is fed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalInput {
    /// Exclusive producer embedded in the tree.
    Direct {
        link: LinkIdentity,
        node: Box<PhysicalNode>,
    },
    /// Read through one endpoint of a shared connector.
    Endpoint {
        link: LinkIdentity,
        endpoint: EndpointRef,
    },
}

impl PhysicalInput {
    pub fn link(&self) -> &LinkIdentity {
        match self {
            PhysicalInput::Direct { link, .. } | PhysicalInput::Endpoint { link, .. } => link,
        }
    }
}

/// Handle to the `index`-th endpoint of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    pub connector: ConnectorId,
    pub index: usize,
}

/// Broadcast fan-out of one producer to `endpoints` consumers.
///
/// Endpoint indices follow the producer's outgoing link declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSpec {
    pub id: ConnectorId,
    pub producer: Box<PhysicalNode>,
    pub endpoints: usize,
}
