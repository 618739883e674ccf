//! Structural validation of logical plans.
//!
//! [`validate`] proves that a [`LogicalPlan`] is a connected DAG with exactly
//! one sink, at least one source feeding every operator, and link counts that
//! agree with every operator's declared arity. Checks run in this order and
//! stop at the first violation:
//!
//! 1. every link endpoint names an operator in the plan
//! 2. the links are acyclic (self-loops count as cycles)
//! 3. the undirected link graph spans every operator
//! 4. exactly one operator has output arity 0
//! 5. at least one operator has input arity 0 and reaches every other operator
//! 6. incoming links equal declared input arity; outgoing links are 0 for sinks
//!    and at least the declared output arity otherwise (fan-out is allowed)
//!
//! Arity runs last: a plan without a sink or without a source always has some
//! operator whose link count disagrees with its arity, and it must report
//! `NoSink`/`NoSource` rather than `Arity`.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use textflow_common::{AritySide, OperatorId, ValidationError};
use tracing::debug;

use crate::logical_plan::LogicalPlan;
use crate::operator::OperatorDescriptor;

/// A logical plan that passed [`validate`], with its adjacency precomputed.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    plan: LogicalPlan,
    topo_order: Vec<OperatorId>,
    inputs: HashMap<OperatorId, Vec<OperatorId>>,
    outputs: HashMap<OperatorId, Vec<OperatorId>>,
    sink: OperatorId,
}

impl ValidatedPlan {
    pub fn logical(&self) -> &LogicalPlan {
        &self.plan
    }

    /// Operators sources-first; ties broken by id.
    pub fn topo_order(&self) -> &[OperatorId] {
        &self.topo_order
    }

    /// Producers feeding `id`, in link declaration order.
    pub fn inputs_of(&self, id: &OperatorId) -> &[OperatorId] {
        self.inputs.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Consumers fed by `id`, in link declaration order.
    pub fn outputs_of(&self, id: &OperatorId) -> &[OperatorId] {
        self.outputs.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sink(&self) -> &OperatorId {
        &self.sink
    }

    /// Descriptor lookup for an id known to be in the plan.
    pub fn descriptor(&self, id: &OperatorId) -> Option<&OperatorDescriptor> {
        self.plan.operator(id)
    }
}

/// Validate a logical plan.
pub fn validate(plan: LogicalPlan) -> Result<ValidatedPlan, ValidationError> {
    check_links_resolve(&plan)?;

    let mut inputs: HashMap<OperatorId, Vec<OperatorId>> = HashMap::new();
    let mut outputs: HashMap<OperatorId, Vec<OperatorId>> = HashMap::new();
    for link in plan.links() {
        outputs
            .entry(link.from.clone())
            .or_default()
            .push(link.to.clone());
        inputs
            .entry(link.to.clone())
            .or_default()
            .push(link.from.clone());
    }

    let topo_order = topological_order(&plan, &inputs, &outputs)?;
    check_connected(&plan, &inputs, &outputs)?;
    let sink = check_single_sink(&plan)?;
    let sources = check_sources(&plan, &outputs)?;
    check_arity(&plan, &inputs, &outputs)?;

    debug!(
        operator = "PlanValidator",
        operators = plan.len(),
        links = plan.links().len(),
        sink = %sink,
        sources = sources.len(),
        "logical plan validated"
    );

    Ok(ValidatedPlan {
        plan,
        topo_order,
        inputs,
        outputs,
        sink,
    })
}

fn check_links_resolve(plan: &LogicalPlan) -> Result<(), ValidationError> {
    for link in plan.links() {
        for endpoint in [&link.from, &link.to] {
            if !plan.contains(endpoint) {
                return Err(ValidationError::UnknownOperator {
                    from: link.from.clone(),
                    to: link.to.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }
    Ok(())
}

// Kahn's algorithm with an ordered ready set so the order is deterministic.
fn topological_order(
    plan: &LogicalPlan,
    inputs: &HashMap<OperatorId, Vec<OperatorId>>,
    outputs: &HashMap<OperatorId, Vec<OperatorId>>,
) -> Result<Vec<OperatorId>, ValidationError> {
    let mut in_degree: HashMap<&OperatorId, usize> = plan
        .operators()
        .map(|op| (&op.id, inputs.get(&op.id).map_or(0, Vec::len)))
        .collect();
    let mut ready: BTreeSet<&OperatorId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(plan.len());
    while let Some(id) = ready.pop_first() {
        order.push(id.clone());
        for next in outputs.get(id).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() == plan.len() {
        return Ok(order);
    }

    // Every leftover operator still has a leftover predecessor, so walking
    // predecessors must revisit an operator; that one lies on a cycle.
    let leftover: BTreeSet<&OperatorId> = in_degree
        .iter()
        .filter(|(_, d)| **d > 0)
        .map(|(id, _)| *id)
        .collect();
    let mut seen = HashSet::new();
    let Some(mut current) = leftover.first().copied() else {
        return Ok(order);
    };
    while seen.insert(current) {
        match inputs
            .get(current)
            .into_iter()
            .flatten()
            .find(|p| leftover.contains(p))
        {
            Some(p) => current = p,
            None => break,
        }
    }
    Err(ValidationError::Cycle {
        operator: current.clone(),
    })
}

fn check_connected(
    plan: &LogicalPlan,
    inputs: &HashMap<OperatorId, Vec<OperatorId>>,
    outputs: &HashMap<OperatorId, Vec<OperatorId>>,
) -> Result<(), ValidationError> {
    let Some(first) = plan.operators().next() else {
        return Ok(());
    };
    let mut visited: HashSet<&OperatorId> = HashSet::from([&first.id]);
    let mut queue = VecDeque::from([&first.id]);
    while let Some(id) = queue.pop_front() {
        let neighbours = inputs
            .get(id)
            .into_iter()
            .flatten()
            .chain(outputs.get(id).into_iter().flatten());
        for n in neighbours {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }
    match plan.operators().find(|op| !visited.contains(&op.id)) {
        Some(op) => Err(ValidationError::DisconnectedGraph {
            operator: op.id.clone(),
        }),
        None => Ok(()),
    }
}

fn check_single_sink(plan: &LogicalPlan) -> Result<OperatorId, ValidationError> {
    let mut sinks: Vec<OperatorId> = plan
        .operators()
        .filter(|op| op.output_arity() == 0)
        .map(|op| op.id.clone())
        .collect();
    match sinks.len() {
        0 => Err(ValidationError::NoSink),
        1 => Ok(sinks.remove(0)),
        _ => Err(ValidationError::MultipleSink { sinks }),
    }
}

fn check_sources(
    plan: &LogicalPlan,
    outputs: &HashMap<OperatorId, Vec<OperatorId>>,
) -> Result<Vec<OperatorId>, ValidationError> {
    let sources: Vec<OperatorId> = plan
        .operators()
        .filter(|op| op.input_arity() == 0)
        .map(|op| op.id.clone())
        .collect();

    let mut reached: HashSet<&OperatorId> = sources.iter().collect();
    let mut queue: VecDeque<&OperatorId> = sources.iter().collect();
    while let Some(id) = queue.pop_front() {
        for n in outputs.get(id).into_iter().flatten() {
            if reached.insert(n) {
                queue.push_back(n);
            }
        }
    }
    match plan.operators().find(|op| !reached.contains(&op.id)) {
        Some(op) => Err(ValidationError::NoSource {
            operator: op.id.clone(),
        }),
        None => Ok(sources),
    }
}

fn check_arity(
    plan: &LogicalPlan,
    inputs: &HashMap<OperatorId, Vec<OperatorId>>,
    outputs: &HashMap<OperatorId, Vec<OperatorId>>,
) -> Result<(), ValidationError> {
    for op in plan.operators() {
        let in_links = inputs.get(&op.id).map_or(0, Vec::len);
        if in_links != op.input_arity() {
            return Err(ValidationError::Arity {
                operator: op.id.clone(),
                side: AritySide::Input,
                declared: op.input_arity(),
                actual: in_links,
            });
        }

        let out_links = outputs.get(&op.id).map_or(0, Vec::len);
        let declared = op.output_arity();
        let ok = if declared == 0 {
            out_links == 0
        } else {
            out_links >= declared
        };
        if !ok {
            return Err(ValidationError::Arity {
                operator: op.id.clone(),
                side: AritySide::Output,
                declared,
                actual: out_links,
            });
        }
    }
    Ok(())
}
