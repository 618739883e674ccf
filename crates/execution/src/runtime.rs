//! Pull-driven executor tree built from a physical plan.
//!
//! Every physical node becomes a [`TupleStream`]: sources wrap a
//! [`SourceExecutor`], other operators wrap one [`OperatorExecutor`] per
//! worker and pull their inputs round-robin in declared link order. Fan-out
//! producers sit behind a shared [`Connector`]; their consumers read through
//! endpoints.

use std::collections::VecDeque;
use std::time::Instant;

use textflow_common::{
    ConnectorId, LinkIdentity, MetricsRegistry, OperatorId, Result, SchemaRef, TextflowError,
    Tuple,
};
use textflow_planner::{output_schema, PhysicalInput, PhysicalNode, PhysicalPlan};
use tracing::{debug, error, info, info_span};

use crate::catalog::CatalogSchemas;
use crate::connector::{Connector, Endpoint};
use crate::context::ExecutionContext;
use crate::executor::{Executor, ExecutorArgs, InputEvent, OperatorExecutor, SourceExecutor};
use crate::lifecycle::Lifecycle;
use crate::registry::ExecutorRegistry;
use crate::stream::{SendableTupleStream, TupleStream};

/// Runtime node around a source executor.
struct SourceNode {
    operator: OperatorId,
    kind: &'static str,
    schema: SchemaRef,
    lifecycle: Lifecycle,
    executor: Box<dyn SourceExecutor>,
    executor_opened: bool,
    metrics: MetricsRegistry,
}

impl TupleStream for SourceNode {
    fn operator(&self) -> &OperatorId {
        &self.operator
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn open(&mut self) -> Result<()> {
        self.lifecycle.open()?;
        self.executor.open()?;
        self.executor_opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.lifecycle.ensure_open("pull")?;
        let started = Instant::now();
        let out = self.executor.next()?;
        self.metrics.record_operator(
            self.operator.as_str(),
            self.kind,
            0,
            u64::from(out.is_some()),
            started.elapsed().as_secs_f64(),
        );
        Ok(out)
    }

    fn close(&mut self) -> Result<()> {
        if self.lifecycle.close()? && self.executor_opened {
            self.executor.close()?;
        }
        Ok(())
    }
}

struct InputSlot {
    link: LinkIdentity,
    stream: SendableTupleStream,
    exhausted: bool,
}

/// Runtime node around the workers of a non-source operator.
struct OperatorNode {
    operator: OperatorId,
    kind: &'static str,
    schema: SchemaRef,
    lifecycle: Lifecycle,
    inputs: Vec<InputSlot>,
    workers: Vec<Box<dyn OperatorExecutor>>,
    /// Workers `[..opened_workers]` opened successfully and must be closed.
    opened_workers: usize,
    next_input: usize,
    next_worker: usize,
    pending: VecDeque<Tuple>,
    metrics: MetricsRegistry,
}

impl OperatorNode {
    /// Index of the next live input at or after `next_input`, wrapping around.
    fn pick_input(&self) -> Option<usize> {
        let n = self.inputs.len();
        (0..n)
            .map(|k| (self.next_input + k) % n)
            .find(|i| !self.inputs[*i].exhausted)
    }

    fn deliver(&mut self, worker: usize, event: InputEvent) -> Result<()> {
        let rows_in = u64::from(matches!(event, InputEvent::Tuple { .. }));
        let started = Instant::now();
        let before = self.pending.len();
        let out = self.workers[worker].process(event)?;
        self.pending.extend(out);
        self.metrics.record_operator(
            self.operator.as_str(),
            self.kind,
            rows_in,
            (self.pending.len() - before) as u64,
            started.elapsed().as_secs_f64(),
        );
        Ok(())
    }
}

impl TupleStream for OperatorNode {
    fn operator(&self) -> &OperatorId {
        &self.operator
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn open(&mut self) -> Result<()> {
        self.lifecycle.open()?;
        for input in &mut self.inputs {
            input.stream.open()?;
        }
        for w in &mut self.workers {
            w.open()?;
            self.opened_workers += 1;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.lifecycle.ensure_open("pull")?;
        loop {
            if let Some(t) = self.pending.pop_front() {
                return Ok(Some(t));
            }
            let Some(i) = self.pick_input() else {
                return Ok(None);
            };
            self.next_input = (i + 1) % self.inputs.len();
            let link = self.inputs[i].link.clone();
            match self.inputs[i].stream.next()? {
                Some(tuple) => {
                    let w = self.next_worker;
                    self.next_worker = (w + 1) % self.workers.len();
                    self.deliver(w, InputEvent::Tuple { tuple, link })?;
                }
                None => {
                    self.inputs[i].exhausted = true;
                    debug!(operator = %self.operator, link = %link, "input exhausted");
                    for w in 0..self.workers.len() {
                        self.deliver(w, InputEvent::Exhausted { link: link.clone() })?;
                    }
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let was_open = self.lifecycle.close()?;
        self.pending.clear();
        // Release everything even if one part fails; report the first failure.
        let mut first_err = None;
        for input in &mut self.inputs {
            if let Err(e) = input.stream.close() {
                first_err.get_or_insert(e);
            }
        }
        if was_open {
            for w in &mut self.workers[..self.opened_workers] {
                if let Err(e) = w.close() {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Executor tree ready to run, rooted at the sink.
pub struct ExecutorTree {
    root: SendableTupleStream,
    connectors: Vec<ConnectorInfo>,
    metrics: MetricsRegistry,
}

/// What the builder wired for one connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorInfo {
    /// Connector id from the physical plan.
    pub id: ConnectorId,
    /// Producer feeding the connector.
    pub producer: OperatorId,
    /// `(consumer, endpoint index)` for every endpoint handed out.
    pub consumers: Vec<(OperatorId, usize)>,
}

impl ExecutorTree {
    /// Schema of the tuples the sink yields.
    pub fn schema(&self) -> SchemaRef {
        self.root.schema()
    }

    /// Connectors wired into this tree.
    pub fn connectors(&self) -> &[ConnectorInfo] {
        &self.connectors
    }

    /// Open the whole tree.
    pub fn open(&mut self) -> Result<()> {
        self.root.open()
    }

    /// Pull the next result tuple from the sink.
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        self.root.next()
    }

    /// Close the whole tree; every node is closed exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.root.close()
    }
}

impl std::fmt::Debug for ExecutorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorTree")
            .field("sink", self.root.operator())
            .field("connectors", &self.connectors)
            .finish()
    }
}

/// Result of [`run_to_completion`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Schema of `tuples`.
    pub schema: SchemaRef,
    /// Everything the sink yielded, in order.
    pub tuples: Vec<Tuple>,
}

struct ConnectorSlot {
    connector: Connector,
    info: ConnectorInfo,
}

struct TreeBuilder<'a> {
    plan: &'a PhysicalPlan,
    registry: &'a ExecutorRegistry,
    ctx: &'a ExecutionContext,
    connectors: Vec<Option<ConnectorSlot>>,
}

/// Instantiate executors for every node of `plan`.
///
/// Output schemas are inferred bottom-up against the context's catalog; every
/// connector in the plan becomes exactly one shared [`Connector`].
pub fn build_executor_tree(
    plan: &PhysicalPlan,
    registry: &ExecutorRegistry,
    ctx: &ExecutionContext,
) -> Result<ExecutorTree> {
    let mut builder = TreeBuilder {
        plan,
        registry,
        ctx,
        connectors: (0..plan.connectors.len()).map(|_| None).collect(),
    };
    let root = builder.build_node(&plan.root)?;

    let mut connectors = Vec::with_capacity(builder.connectors.len());
    for (i, slot) in builder.connectors.into_iter().enumerate() {
        let slot = slot.ok_or_else(|| {
            TextflowError::Execution(format!(
                "{} is not referenced by any consumer",
                ConnectorId(i)
            ))
        })?;
        if slot.info.consumers.len() != slot.connector.endpoint_count() {
            return Err(TextflowError::Execution(format!(
                "{} has {} endpoints but {} consumers",
                slot.info.id,
                slot.connector.endpoint_count(),
                slot.info.consumers.len()
            )));
        }
        connectors.push(slot.info);
    }

    debug!(
        operator = "ExecutorTree",
        sink = %root.operator(),
        connectors = connectors.len(),
        "executor tree built"
    );
    Ok(ExecutorTree {
        root,
        connectors,
        metrics: ctx.metrics.clone(),
    })
}

impl TreeBuilder<'_> {
    fn build_node(&mut self, node: &PhysicalNode) -> Result<SendableTupleStream> {
        let mut links = Vec::with_capacity(node.inputs.len());
        let mut streams = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            links.push(input.link().clone());
            let stream = match input {
                PhysicalInput::Direct { node, .. } => self.build_node(node)?,
                PhysicalInput::Endpoint { endpoint, .. } => {
                    Box::new(self.endpoint(endpoint.connector, endpoint.index, node.id())?)
                }
            };
            streams.push(stream);
        }

        let input_schemas: Vec<SchemaRef> = streams.iter().map(|s| s.schema()).collect();
        let schema = output_schema(
            &node.operator,
            &input_schemas,
            &CatalogSchemas(self.ctx.catalog.as_ref()),
        )?;
        let factory = self.registry.require(node.operator.kind.tag())?;

        let args = |worker| ExecutorArgs {
            descriptor: &node.operator,
            input_schemas: &input_schemas,
            input_links: &links,
            output_schema: &schema,
            worker,
            ctx: self.ctx,
        };
        let kind = node.operator.kind.tag();
        let operator = node.id().clone();
        let metrics = self.ctx.metrics.clone();

        if streams.is_empty() {
            let Executor::Source(executor) = factory.create(args(0))? else {
                return Err(TextflowError::Execution(format!(
                    "factory for {kind} returned a non-source executor for source {operator}"
                )));
            };
            return Ok(Box::new(SourceNode {
                lifecycle: Lifecycle::new(operator.clone()),
                operator,
                kind,
                schema,
                executor,
                executor_opened: false,
                metrics,
            }));
        }

        let workers = node.workers.max(1);
        let mut executors = Vec::with_capacity(workers);
        for w in 0..workers {
            match factory.create(args(w))? {
                Executor::Operator(e) => executors.push(e),
                Executor::Source(_) => {
                    return Err(TextflowError::Execution(format!(
                        "factory for {kind} returned a source executor for {operator}"
                    )))
                }
            }
        }
        Ok(Box::new(OperatorNode {
            lifecycle: Lifecycle::new(operator.clone()),
            operator,
            kind,
            schema,
            inputs: links
                .into_iter()
                .zip(streams)
                .map(|(link, stream)| InputSlot {
                    link,
                    stream,
                    exhausted: false,
                })
                .collect(),
            workers: executors,
            opened_workers: 0,
            next_input: 0,
            next_worker: 0,
            pending: VecDeque::new(),
            metrics,
        }))
    }

    fn endpoint(
        &mut self,
        id: ConnectorId,
        index: usize,
        consumer: &OperatorId,
    ) -> Result<Endpoint> {
        let built = match self.connectors.get(id.0) {
            None => return Err(TextflowError::Execution(format!("unknown {id}"))),
            Some(slot) => slot.is_some(),
        };
        if !built {
            let spec = self
                .plan
                .connector(id)
                .ok_or_else(|| TextflowError::Execution(format!("unknown {id}")))?;
            let upstream = self.build_node(&spec.producer)?;
            let connector = Connector::new(id, upstream, spec.endpoints, self.ctx)?;
            self.connectors[id.0] = Some(ConnectorSlot {
                info: ConnectorInfo {
                    id,
                    producer: connector.producer().clone(),
                    consumers: Vec::new(),
                },
                connector,
            });
        }

        let slot = self.connectors[id.0]
            .as_mut()
            .ok_or_else(|| TextflowError::Execution(format!("unknown {id}")))?;
        let endpoint = slot.connector.endpoint(index)?;
        slot.info.consumers.push((consumer.clone(), index));
        Ok(endpoint)
    }
}

/// Open `tree`, pull the sink until end of stream, and close it.
///
/// The tree is closed on every path; a failure is logged, counted in
/// `textflow_run_failures_total`, and returned after cleanup.
pub fn run_to_completion(mut tree: ExecutorTree) -> Result<RunOutput> {
    let sink = tree.root.operator().clone();
    let _span = info_span!("run_to_completion", sink = %sink).entered();
    let started = Instant::now();

    let pulled = (|| {
        tree.open()?;
        let mut tuples = Vec::new();
        while let Some(t) = tree.next()? {
            tuples.push(t);
        }
        Ok::<_, TextflowError>(tuples)
    })();
    let closed = tree.close();

    let outcome = match (pulled, closed) {
        (Ok(tuples), Ok(())) => Ok(tuples),
        (Err(e), _) | (Ok(_), Err(e)) => Err(e),
    };
    match outcome {
        Ok(tuples) => {
            info!(
                sink = %sink,
                rows = tuples.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "run completed"
            );
            Ok(RunOutput {
                schema: tree.schema(),
                tuples,
            })
        }
        Err(e) => {
            error!(sink = %sink, error = %e, kind = e.kind(), "run failed");
            tree.metrics.inc_run_failures(e.kind());
            Err(e)
        }
    }
}
