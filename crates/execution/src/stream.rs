//! Pull-based tuple stream abstraction shared by runtime nodes and connectors.

use std::collections::VecDeque;

use textflow_common::{OperatorId, Result, SchemaRef, Tuple};

use crate::lifecycle::Lifecycle;

/// A pullable producer of tuples that knows its output schema.
///
/// Protocol: `open` once, `next` until it returns `None`, `close` once.
/// Closing propagates to every upstream the stream owns.
pub trait TupleStream: Send {
    /// Operator whose output this stream yields.
    fn operator(&self) -> &OperatorId;

    /// Schema of every tuple yielded.
    fn schema(&self) -> SchemaRef;

    /// Open this stream and everything upstream of it.
    fn open(&mut self) -> Result<()>;

    /// Next tuple, `None` at end of stream.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Release this stream and everything upstream of it.
    fn close(&mut self) -> Result<()>;
}

/// The standard "stream you can hand to a consumer".
pub type SendableTupleStream = Box<dyn TupleStream>;

/// Stream over an owned batch of tuples.
pub struct MemoryStream {
    operator: OperatorId,
    schema: SchemaRef,
    rows: VecDeque<Tuple>,
    lifecycle: Lifecycle,
}

impl MemoryStream {
    /// Stream yielding `rows` in order, attributed to `operator`.
    pub fn new(operator: impl Into<OperatorId>, schema: SchemaRef, rows: Vec<Tuple>) -> Self {
        let operator = operator.into();
        Self {
            lifecycle: Lifecycle::new(operator.clone()),
            operator,
            schema,
            rows: rows.into(),
        }
    }
}

impl TupleStream for MemoryStream {
    fn operator(&self) -> &OperatorId {
        &self.operator
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn open(&mut self) -> Result<()> {
        self.lifecycle.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.lifecycle.ensure_open("pull")?;
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        self.rows.clear();
        Ok(())
    }
}
