//! Broadcast fan-out of one producer to several independent consumers.
//!
//! A [`Connector`] pulls its upstream once and keeps one read cursor per
//! [`Endpoint`] over a shared buffer. An element is evicted once every live
//! endpoint has read past it, so a slow endpoint only holds back memory,
//! never its siblings. The upstream is closed when the last live endpoint
//! closes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use textflow_common::{
    ConnectorId, MetricsRegistry, OperatorId, Result, SchemaRef, TextflowError, Tuple,
};
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::lifecycle::Lifecycle;
use crate::stream::{SendableTupleStream, TupleStream};

struct Shared {
    producer: OperatorId,
    upstream: SendableTupleStream,
    buffer: VecDeque<Tuple>,
    /// Absolute position of `buffer[0]`.
    base: usize,
    cursors: Vec<usize>,
    live: Vec<bool>,
    upstream_opened: bool,
    upstream_done: bool,
    upstream_closed: bool,
    warn_rows: usize,
    warned: bool,
    metrics: MetricsRegistry,
}

impl Shared {
    fn pull(&mut self, index: usize) -> Result<Option<Tuple>> {
        let pos = self.cursors[index];
        if pos >= self.base + self.buffer.len() {
            if self.upstream_done {
                return Ok(None);
            }
            match self.upstream.next()? {
                Some(t) => self.buffer.push_back(t),
                None => {
                    self.upstream_done = true;
                    return Ok(None);
                }
            }
        }
        let Some(offset) = pos.checked_sub(self.base) else {
            return Err(TextflowError::Execution(format!(
                "connector for {}: endpoint {index} at {pos} is behind evicted rows (base {})",
                self.producer, self.base
            )));
        };
        let tuple = self.buffer[offset].clone();
        self.cursors[index] = pos + 1;
        self.evict();
        Ok(Some(tuple))
    }

    fn evict(&mut self) {
        let slowest = self
            .cursors
            .iter()
            .zip(&self.live)
            .filter(|(_, live)| **live)
            .map(|(c, _)| *c)
            .min()
            .unwrap_or(self.base + self.buffer.len());
        while self.base < slowest && !self.buffer.is_empty() {
            self.buffer.pop_front();
            self.base += 1;
        }

        let buffered = self.buffer.len();
        self.metrics
            .set_connector_buffered_rows(self.producer.as_str(), buffered);
        if buffered >= self.warn_rows && !self.warned {
            self.warned = true;
            warn!(
                operator = "Connector",
                producer = %self.producer,
                buffered,
                "connector backlog is large; one consumer is far behind its siblings"
            );
        }
    }
}

/// Shared fan-out node owned by one producer.
pub struct Connector {
    id: ConnectorId,
    producer: OperatorId,
    schema: SchemaRef,
    shared: Arc<Mutex<Shared>>,
    handed_out: Vec<bool>,
}

impl Connector {
    /// Fan `upstream` out to `endpoints` consumers.
    pub fn new(
        id: ConnectorId,
        upstream: SendableTupleStream,
        endpoints: usize,
        ctx: &ExecutionContext,
    ) -> Result<Self> {
        if endpoints == 0 {
            return Err(TextflowError::InvalidConfig(format!(
                "{id}: a connector needs at least one endpoint"
            )));
        }
        let producer = upstream.operator().clone();
        let schema = upstream.schema();
        let shared = Shared {
            producer: producer.clone(),
            upstream,
            buffer: VecDeque::new(),
            base: 0,
            cursors: vec![0; endpoints],
            // Every endpoint holds the buffer until it is closed, handed out or not.
            live: vec![true; endpoints],
            upstream_opened: false,
            upstream_done: false,
            upstream_closed: false,
            warn_rows: ctx.config.connector_buffer_warn_rows.max(1),
            warned: false,
            metrics: ctx.metrics.clone(),
        };
        Ok(Self {
            id,
            producer,
            schema,
            shared: Arc::new(Mutex::new(shared)),
            handed_out: vec![false; endpoints],
        })
    }

    /// Id assigned by the physical plan.
    pub fn id(&self) -> ConnectorId {
        self.id
    }

    /// Operator feeding this connector.
    pub fn producer(&self) -> &OperatorId {
        &self.producer
    }

    /// Number of endpoints, handed out or not.
    pub fn endpoint_count(&self) -> usize {
        self.handed_out.len()
    }

    /// Hand out the lowest endpoint index not handed out yet.
    pub fn next_output_endpoint(&mut self) -> Result<Endpoint> {
        let index = self
            .handed_out
            .iter()
            .position(|taken| !taken)
            .ok_or_else(|| {
                TextflowError::Execution(format!(
                    "{}: all {} endpoints already handed out",
                    self.id,
                    self.handed_out.len()
                ))
            })?;
        self.endpoint(index)
    }

    /// Hand out a specific endpoint. Each index can be taken once.
    pub fn endpoint(&mut self, index: usize) -> Result<Endpoint> {
        match self.handed_out.get(index) {
            None => {
                return Err(TextflowError::Execution(format!(
                    "{}: endpoint {index} out of range ({} endpoints)",
                    self.id,
                    self.handed_out.len()
                )))
            }
            Some(true) => {
                return Err(TextflowError::Execution(format!(
                    "{}: endpoint {index} already handed out",
                    self.id
                )))
            }
            Some(false) => {}
        }
        self.handed_out[index] = true;
        Ok(Endpoint {
            index,
            producer: self.producer.clone(),
            schema: self.schema.clone(),
            shared: Arc::clone(&self.shared),
            lifecycle: Lifecycle::new(self.producer.clone()),
        })
    }

    /// Tuples currently held for slower endpoints.
    pub fn buffered_rows(&self) -> Result<usize> {
        Ok(lock(&self.shared)?.buffer.len())
    }
}

/// One consumer's read handle on a [`Connector`].
pub struct Endpoint {
    index: usize,
    producer: OperatorId,
    schema: SchemaRef,
    shared: Arc<Mutex<Shared>>,
    lifecycle: Lifecycle,
}

impl Endpoint {
    /// Position of this endpoint in the connector's endpoint table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether both endpoints read from the same connector instance.
    pub fn shares_connector(&self, other: &Endpoint) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Whether this endpoint belongs to `connector`.
    pub fn belongs_to(&self, connector: &Connector) -> bool {
        Arc::ptr_eq(&self.shared, &connector.shared)
    }

    /// Next tuple for this endpoint, pulling upstream only when this endpoint
    /// has caught up with everything buffered.
    pub fn pull(&mut self) -> Result<Option<Tuple>> {
        self.lifecycle.ensure_open("pull")?;
        lock(&self.shared)?.pull(self.index)
    }
}

impl TupleStream for Endpoint {
    fn operator(&self) -> &OperatorId {
        &self.producer
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn open(&mut self) -> Result<()> {
        self.lifecycle.open()?;
        let mut shared = lock(&self.shared)?;
        if !shared.upstream_opened {
            shared.upstream_opened = true;
            shared.upstream.open()?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.pull()
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        let mut shared = lock(&self.shared)?;
        shared.live[self.index] = false;
        shared.evict();
        if shared.live.iter().all(|l| !l) && !shared.upstream_closed {
            shared.upstream_closed = true;
            debug!(
                operator = "Connector",
                producer = %self.producer,
                "last endpoint closed, closing upstream"
            );
            shared.upstream.close()?;
        }
        Ok(())
    }
}

fn lock(shared: &Mutex<Shared>) -> Result<MutexGuard<'_, Shared>> {
    shared
        .lock()
        .map_err(|_| TextflowError::Execution("connector lock poisoned".to_string()))
}
