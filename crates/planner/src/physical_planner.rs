use std::collections::HashMap;

use textflow_common::{ConnectorId, EngineConfig, LinkIdentity, OperatorId, Result, TextflowError};
use tracing::debug;

use crate::physical_plan::{ConnectorSpec, EndpointRef, PhysicalInput, PhysicalNode, PhysicalPlan};
use crate::validator::ValidatedPlan;

#[derive(Debug, Clone)]
pub struct PhysicalPlannerConfig {
    /// Workers given to operators that can run in parallel.
    pub default_workers: usize,
}

impl Default for PhysicalPlannerConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for PhysicalPlannerConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            default_workers: cfg.default_workers.max(1),
        }
    }
}

/// Lower a validated logical plan to its physical tree.
///
/// Contracts:
/// - operators are visited sources-first, so every producer is built before
///   its consumers;
/// - a producer with one consumer is embedded under that consumer;
/// - a producer with several consumers gets exactly one connector, and each
///   consumer reads the endpoint at its position in the producer's outgoing
///   link order;
/// - node inputs follow the consumer's incoming link declaration order, which
///   fixes operand roles such as a join's inner and outer side;
/// - every operator ends up reachable from the sink (no orphans).
pub fn create_physical_plan(
    plan: &ValidatedPlan,
    cfg: &PhysicalPlannerConfig,
) -> Result<PhysicalPlan> {
    let mut built: HashMap<OperatorId, PhysicalNode> = HashMap::new();
    let mut connectors: Vec<ConnectorSpec> = Vec::new();
    let mut connector_of: HashMap<OperatorId, ConnectorId> = HashMap::new();

    for id in plan.topo_order() {
        let descriptor = plan
            .descriptor(id)
            .ok_or_else(|| TextflowError::Execution(format!("validated plan lost operator {id}")))?;

        let mut inputs = Vec::with_capacity(plan.inputs_of(id).len());
        for producer in plan.inputs_of(id) {
            let link = LinkIdentity::new(producer.clone(), id.clone());
            let consumers = plan.outputs_of(producer);
            if consumers.len() == 1 {
                let node = take_built(&mut built, producer)?;
                inputs.push(PhysicalInput::Direct {
                    link,
                    node: Box::new(node),
                });
                continue;
            }

            let connector = match connector_of.get(producer) {
                Some(c) => *c,
                None => {
                    let c = ConnectorId(connectors.len());
                    let node = take_built(&mut built, producer)?;
                    connectors.push(ConnectorSpec {
                        id: c,
                        producer: Box::new(node),
                        endpoints: consumers.len(),
                    });
                    connector_of.insert(producer.clone(), c);
                    debug!(
                        operator = "PhysicalPlanner",
                        producer = %producer,
                        connector = %c,
                        endpoints = consumers.len(),
                        "connector allocated"
                    );
                    c
                }
            };
            let index = consumers.iter().position(|c| c == id).ok_or_else(|| {
                TextflowError::Execution(format!("{producer} does not list {id} as a consumer"))
            })?;
            inputs.push(PhysicalInput::Endpoint {
                link,
                endpoint: EndpointRef { connector, index },
            });
        }

        let workers = descriptor.kind.workers(id, cfg.default_workers)?;
        built.insert(
            id.clone(),
            PhysicalNode {
                operator: descriptor.clone(),
                workers,
                inputs,
            },
        );
    }

    let root = take_built(&mut built, plan.sink())?;
    if let Some(orphan) = built.keys().min() {
        return Err(TextflowError::Execution(format!(
            "operator {orphan} is not reachable from sink {}",
            plan.sink()
        )));
    }

    debug!(
        operator = "PhysicalPlanner",
        sink = %root.id(),
        connectors = connectors.len(),
        "physical plan created"
    );
    Ok(PhysicalPlan { root, connectors })
}

fn take_built(built: &mut HashMap<OperatorId, PhysicalNode>, id: &OperatorId) -> Result<PhysicalNode> {
    built
        .remove(id)
        .ok_or_else(|| TextflowError::Execution(format!("operator {id} consumed before it was built")))
}
