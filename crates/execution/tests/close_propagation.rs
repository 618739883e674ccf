mod support;

use std::sync::{Arc, Mutex};

use support::*;
use textflow_common::{MetricsRegistry, Result, TextflowError};
use textflow_execution::{
    build_executor_tree, no_tuples, run_to_completion, ExecutionContext, Executor, ExecutorArgs,
    ExecutorRegistry, FnFactory, InputEvent, OperatorExecutor, TupleIter,
};
use textflow_planner::{KeywordMatchingType, OperatorDescriptor, OperatorKind, PhysicalPlan};

const SCAN_ID: &str = "scan";
const KEYWORD_ID: &str = "keyword";

fn keyword_matcher() -> OperatorDescriptor {
    OperatorDescriptor::new(
        KEYWORD_ID,
        OperatorKind::KeywordMatcher {
            query: "irvine".to_string(),
            attributes: vec!["content".to_string()],
            matching: KeywordMatchingType::Conjunction,
            result_attribute: "keywordResults".to_string(),
        },
    )
}

/// scan -> {regex, keyword} -> join -> sink
fn shared_scan_plan() -> PhysicalPlan {
    physical(
        plan(
            vec![
                scan_source(SCAN_ID, TEST_TABLE),
                regex(),
                keyword_matcher(),
                join_distance(),
                tuple_sink(),
            ],
            &[
                (SCAN_ID, REGEX_ID),
                (SCAN_ID, KEYWORD_ID),
                (REGEX_ID, JOIN_DISTANCE_ID),
                (KEYWORD_ID, JOIN_DISTANCE_ID),
                (JOIN_DISTANCE_ID, TUPLE_SINK_ID),
            ],
        ),
        2,
    )
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new(catalog_with(TEST_TABLE, test_schema(), Vec::new()))
        .with_metrics(MetricsRegistry::new())
}

#[test]
fn shared_source_is_traversed_and_closed_once() {
    let (registry, calls) = counting_registry(test_rows(), None);
    let tree = build_executor_tree(&shared_scan_plan(), &registry, &ctx()).unwrap();
    assert_eq!(tree.connectors().len(), 1);
    assert_eq!(tree.connectors()[0].consumers.len(), 2);

    let out = run_to_completion(tree).unwrap();
    // Only the first row mentions irvine and california.
    assert_eq!(out.tuples.len(), 1);
    assert_eq!(calls.opens(), 1);
    assert_eq!(calls.closes(), 1);
    // three rows plus one end-of-stream pull
    assert_eq!(calls.pulls(), test_rows().len() + 1);
}

#[test]
fn failure_closes_everything_and_is_counted() {
    init_tracing();
    let (registry, calls) = counting_registry(test_rows(), Some(1));
    let ctx = ctx();
    let tree = build_executor_tree(&shared_scan_plan(), &registry, &ctx).unwrap();

    let err = run_to_completion(tree).unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert_eq!(calls.opens(), 1);
    assert_eq!(calls.closes(), 1);

    let text = ctx.metrics.render_prometheus();
    assert!(text.contains(r#"textflow_run_failures_total{error_kind="execution"} 1"#));
}

#[test]
fn closing_an_unopened_tree_skips_executors() {
    let (registry, calls) = counting_registry(test_rows(), None);
    let mut tree = build_executor_tree(&shared_scan_plan(), &registry, &ctx()).unwrap();
    tree.close().unwrap();
    assert_eq!(calls.opens(), 0);
    assert_eq!(calls.closes(), 0);
    assert_eq!(tree.close().unwrap_err().kind(), "executor_state");
}

#[test]
fn pulling_before_open_is_rejected() {
    let (registry, calls) = counting_registry(test_rows(), None);
    let mut tree = build_executor_tree(&shared_scan_plan(), &registry, &ctx()).unwrap();
    let err = tree.next().unwrap_err();
    assert_eq!(err.kind(), "executor_state");
    assert_eq!(calls.pulls(), 0);
}

/// Regex stand-in that logs its lifecycle; worker 1 fails to open.
struct LoggedWorker {
    worker: usize,
    log: Arc<Mutex<Vec<String>>>,
}

impl OperatorExecutor for LoggedWorker {
    fn open(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(format!("open {}", self.worker));
        if self.worker == 1 {
            return Err(TextflowError::Execution("worker 1 cannot open".to_string()));
        }
        Ok(())
    }

    fn process(&mut self, _input: InputEvent) -> Result<TupleIter> {
        Ok(no_tuples())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(format!("close {}", self.worker));
        Ok(())
    }
}

#[test]
fn failed_worker_open_closes_only_opened_workers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ExecutorRegistry::with_builtins();
    let shared = Arc::clone(&log);
    registry.register(Arc::new(FnFactory::new(
        "RegexMatcher",
        move |args: ExecutorArgs<'_>| {
            Ok(Executor::Operator(Box::new(LoggedWorker {
                worker: args.worker,
                log: Arc::clone(&shared),
            })))
        },
    )));
    let ctx = context();
    let tree = build_executor_tree(&physical(logical_plan_1(), 3), &registry, &ctx).unwrap();

    let err = run_to_completion(tree).unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("worker 1 cannot open"));
    assert_eq!(*log.lock().unwrap(), ["open 0", "open 1", "close 0"]);

    let text = ctx.metrics.render_prometheus();
    assert!(text.contains(r#"textflow_run_failures_total{error_kind="execution"} 1"#));
    assert!(!text.contains("executor_state"));
}
