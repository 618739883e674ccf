use textflow_common::Result;
use textflow_planner::OperatorKind;

use super::kind_mismatch;
use crate::executor::{no_tuples, tuples, Executor, ExecutorArgs, InputEvent, OperatorExecutor, TupleIter};

/// Forwards every tuple to whoever pulls the plan root.
struct TupleSinkExec;

impl OperatorExecutor for TupleSinkExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        match input {
            InputEvent::Tuple { tuple, .. } => Ok(tuples(vec![tuple])),
            InputEvent::Exhausted { .. } => Ok(no_tuples()),
        }
    }
}

pub(crate) fn tuple_sink(args: ExecutorArgs<'_>) -> Result<Executor> {
    if !matches!(args.descriptor.kind, OperatorKind::TupleSink) {
        return Err(kind_mismatch(&args, "TupleSink"));
    }
    Ok(Executor::Operator(Box::new(TupleSinkExec)))
}
