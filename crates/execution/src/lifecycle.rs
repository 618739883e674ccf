//! Open/close state guard for executors, endpoints and runtime nodes.

use textflow_common::{OperatorId, Result, TextflowError};

/// Executor lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, not yet opened.
    Unopened,
    /// Accepting pulls.
    Open,
    /// Resources released.
    Closed,
}

impl LifecycleState {
    fn name(&self) -> &'static str {
        match self {
            LifecycleState::Unopened => "unopened",
            LifecycleState::Open => "open",
            LifecycleState::Closed => "closed",
        }
    }
}

/// Guard enforcing `Unopened -> Open -> Closed` for one runtime node.
///
/// Closing an unopened node is allowed so error paths can release a tree
/// that failed halfway through opening.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    operator: OperatorId,
    state: LifecycleState,
}

impl Lifecycle {
    /// New guard in `Unopened`.
    pub fn new(operator: OperatorId) -> Self {
        Self {
            operator,
            state: LifecycleState::Unopened,
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// `Unopened -> Open`.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Unopened => {
                self.state = LifecycleState::Open;
                Ok(())
            }
            _ => Err(self.violation("open")),
        }
    }

    /// Fails unless the node is open.
    pub fn ensure_open(&self, action: &'static str) -> Result<()> {
        match self.state {
            LifecycleState::Open => Ok(()),
            _ => Err(self.violation(action)),
        }
    }

    /// `Unopened | Open -> Closed`. Returns whether the node had been opened.
    pub fn close(&mut self) -> Result<bool> {
        match self.state {
            LifecycleState::Closed => Err(self.violation("close")),
            prev => {
                self.state = LifecycleState::Closed;
                Ok(prev == LifecycleState::Open)
            }
        }
    }

    fn violation(&self, action: &'static str) -> TextflowError {
        TextflowError::ExecutorState {
            operator: self.operator.clone(),
            state: self.state.name(),
            action,
        }
    }
}
