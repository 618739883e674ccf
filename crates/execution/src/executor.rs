//! Operator executor contracts.

use textflow_common::{LinkIdentity, OperatorId, Result, SchemaRef, Tuple};
use textflow_planner::OperatorDescriptor;

use crate::context::ExecutionContext;

/// One input delivered to an executor, tagged with the link it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A tuple produced upstream.
    Tuple {
        /// The tuple.
        tuple: Tuple,
        /// Link it arrived on.
        link: LinkIdentity,
    },
    /// The link will deliver no further tuples.
    Exhausted {
        /// The exhausted link.
        link: LinkIdentity,
    },
}

impl InputEvent {
    /// Link the event arrived on.
    pub fn link(&self) -> &LinkIdentity {
        match self {
            InputEvent::Tuple { link, .. } | InputEvent::Exhausted { link } => link,
        }
    }
}

/// Output of one `process` call. Each call returns a fresh sequence.
pub type TupleIter = Box<dyn Iterator<Item = Tuple> + Send>;

/// Wrap an owned batch as a [`TupleIter`].
pub fn tuples(batch: Vec<Tuple>) -> TupleIter {
    Box::new(batch.into_iter())
}

/// Empty [`TupleIter`].
pub fn no_tuples() -> TupleIter {
    Box::new(std::iter::empty())
}

/// Executor of an operator with at least one input.
///
/// The runtime calls `open` once, then `process` for every input event in
/// per-link FIFO order, then `close` once. A `process` error is fatal for the
/// instance; the runtime does not retry.
pub trait OperatorExecutor: Send {
    /// Acquire resources before the first event.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Consume one event and return the tuples it produced.
    fn process(&mut self, input: InputEvent) -> Result<TupleIter>;

    /// Release resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Executor of a source operator, pulled one tuple at a time.
pub trait SourceExecutor: Send {
    /// Acquire resources before the first pull.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next tuple, `None` at end of stream.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Release resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A freshly created executor instance.
pub enum Executor {
    /// Zero-input operator.
    Source(Box<dyn SourceExecutor>),
    /// Operator fed by input links.
    Operator(Box<dyn OperatorExecutor>),
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Executor::Source(_) => f.write_str("Executor::Source"),
            Executor::Operator(_) => f.write_str("Executor::Operator"),
        }
    }
}

/// Everything a factory needs to instantiate one executor.
#[derive(Clone, Copy)]
pub struct ExecutorArgs<'a> {
    /// Operator id and configuration.
    pub descriptor: &'a OperatorDescriptor,
    /// Input schemas in declared link order.
    pub input_schemas: &'a [SchemaRef],
    /// Input links in declared order; the first is a join's inner operand.
    pub input_links: &'a [LinkIdentity],
    /// Inferred output schema.
    pub output_schema: &'a SchemaRef,
    /// Worker index of this instance among the operator's workers.
    pub worker: usize,
    /// Shared runtime services.
    pub ctx: &'a ExecutionContext,
}

impl ExecutorArgs<'_> {
    /// Operator id.
    pub fn id(&self) -> &OperatorId {
        &self.descriptor.id
    }
}
