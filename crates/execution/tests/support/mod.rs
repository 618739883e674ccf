#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use textflow_common::{
    AttributeType, Field, MetricsRegistry, Result, Schema, SchemaRef, Span, TextflowError, Tuple,
};
use textflow_execution::{
    no_tuples, tuples, ExecutionContext, Executor, ExecutorArgs, ExecutorFactory,
    ExecutorRegistry, FnFactory, InputEvent, MemoryCatalog, OperatorExecutor, SourceExecutor, TupleIter,
};
use textflow_planner::{
    create_physical_plan, validate, KeywordMatchingType, LogicalPlan, NlpEntityType,
    OperatorDescriptor, OperatorKind, OperatorLink, PhysicalPlan, PhysicalPlannerConfig,
};
use tracing_subscriber::EnvFilter;

pub const TEST_TABLE: &str = "execution_test_table";

/// Route runtime logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub const KEYWORD_SOURCE_ID: &str = "keyword source";
pub const REGEX_ID: &str = "regex";
pub const NLP_ENTITY_ID: &str = "nlp entity";
pub const JOIN_DISTANCE_ID: &str = "join distance";
pub const TUPLE_SINK_ID: &str = "tuple sink";

pub fn test_schema() -> SchemaRef {
    Arc::new(
        Schema::builder()
            .add("city", AttributeType::String)
            .add("location", AttributeType::String)
            .add("content", AttributeType::Text)
            .build()
            .unwrap(),
    )
}

pub fn row(city: &str, location: &str, content: &str) -> Tuple {
    Tuple::new(
        test_schema(),
        vec![
            Field::String(city.to_string()),
            Field::String(location.to_string()),
            Field::Text(content.to_string()),
        ],
    )
    .unwrap()
}

/// Two rows mention Irvine; only the first also matches `ca(lifornia)?`.
pub fn test_rows() -> Vec<Tuple> {
    vec![
        row(
            "Irvine",
            "Irvine, CA",
            "UC Irvine sits in Irvine, southern california.",
        ),
        row("Irvine", "Irvine, CA", "Irvine Spectrum shopping"),
        row("Los Angeles", "Los Angeles, CA", "A large city in california"),
    ]
}

pub fn catalog_with(table: &str, schema: SchemaRef, rows: Vec<Tuple>) -> Arc<MemoryCatalog> {
    let catalog = MemoryCatalog::new();
    catalog.register_table(table, schema, rows).unwrap();
    Arc::new(catalog)
}

/// Context over the test table with a private metrics registry.
pub fn context() -> ExecutionContext {
    ExecutionContext::new(catalog_with(TEST_TABLE, test_schema(), test_rows()))
        .with_metrics(MetricsRegistry::new())
}

pub fn keyword_source() -> OperatorDescriptor {
    OperatorDescriptor::new(
        KEYWORD_SOURCE_ID,
        OperatorKind::KeywordSource {
            table: TEST_TABLE.to_string(),
            query: "irvine".to_string(),
            attributes: vec![
                "city".to_string(),
                "location".to_string(),
                "content".to_string(),
            ],
            matching: KeywordMatchingType::Phrase,
            result_attribute: "keywordSourceResults".to_string(),
        },
    )
}

pub fn scan_source(id: &str, table: &str) -> OperatorDescriptor {
    OperatorDescriptor::new(
        id,
        OperatorKind::ScanSource {
            table: table.to_string(),
        },
    )
}

pub fn regex() -> OperatorDescriptor {
    OperatorDescriptor::new(
        REGEX_ID,
        OperatorKind::RegexMatcher {
            pattern: "ca(lifornia)?".to_string(),
            attributes: vec!["location".to_string(), "content".to_string()],
            result_attribute: "regexResults".to_string(),
        },
    )
}

pub fn nlp_entity() -> OperatorDescriptor {
    OperatorDescriptor::new(
        NLP_ENTITY_ID,
        OperatorKind::NlpEntity {
            entity_type: NlpEntityType::Location,
            attributes: vec!["content".to_string()],
            result_attribute: "nlpEntityResults".to_string(),
        },
    )
}

pub fn join_distance() -> OperatorDescriptor {
    OperatorDescriptor::new(
        JOIN_DISTANCE_ID,
        OperatorKind::Join {
            inner_attribute: "content".to_string(),
            outer_attribute: "content".to_string(),
            threshold: 100,
        },
    )
}

pub fn tuple_sink() -> OperatorDescriptor {
    OperatorDescriptor::new(TUPLE_SINK_ID, OperatorKind::TupleSink)
}

pub fn plan(ops: Vec<OperatorDescriptor>, links: &[(&str, &str)]) -> LogicalPlan {
    let mut p = LogicalPlan::new();
    for op in ops {
        p.add_operator(op).unwrap();
    }
    for (from, to) in links {
        p.add_link(OperatorLink::new(*from, *to)).unwrap();
    }
    p
}

/// KeywordSource -> RegexMatcher -> TupleSink
pub fn logical_plan_1() -> LogicalPlan {
    plan(
        vec![keyword_source(), regex(), tuple_sink()],
        &[(KEYWORD_SOURCE_ID, REGEX_ID), (REGEX_ID, TUPLE_SINK_ID)],
    )
}

/// KeywordSource -> {RegexMatcher, NlpEntity} -> Join -> TupleSink
pub fn logical_plan_2() -> LogicalPlan {
    plan(
        vec![
            keyword_source(),
            regex(),
            nlp_entity(),
            join_distance(),
            tuple_sink(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (KEYWORD_SOURCE_ID, NLP_ENTITY_ID),
            (REGEX_ID, JOIN_DISTANCE_ID),
            (NLP_ENTITY_ID, JOIN_DISTANCE_ID),
            (JOIN_DISTANCE_ID, TUPLE_SINK_ID),
        ],
    )
}

pub fn physical(plan: LogicalPlan, default_workers: usize) -> PhysicalPlan {
    let validated = validate(plan).unwrap();
    create_physical_plan(&validated, &PhysicalPlannerConfig { default_workers }).unwrap()
}

/// Marks every occurrence of "Irvine" as a location entity.
struct FakeNlpEntity {
    attributes: Vec<String>,
    output_schema: SchemaRef,
}

impl OperatorExecutor for FakeNlpEntity {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        let InputEvent::Tuple { tuple, .. } = input else {
            return Ok(no_tuples());
        };
        let mut spans = Vec::new();
        for attribute in &self.attributes {
            let text = tuple.get_str(attribute)?;
            spans.extend(text.match_indices("Irvine").map(|(start, m)| Span {
                attribute: attribute.clone(),
                start,
                end: start + m.len(),
                key: "LOCATION".to_string(),
                value: m.to_string(),
            }));
        }
        if spans.is_empty() {
            return Ok(no_tuples());
        }
        let mut fields = tuple.into_fields();
        fields.push(Field::List(spans));
        Ok(tuples(vec![Tuple::new(self.output_schema.clone(), fields)?]))
    }
}

pub fn fake_nlp_factory() -> Arc<dyn ExecutorFactory> {
    fn create(args: ExecutorArgs<'_>) -> Result<Executor> {
        let OperatorKind::NlpEntity { attributes, .. } = &args.descriptor.kind else {
            return Err(TextflowError::Execution("not an NlpEntity".to_string()));
        };
        Ok(Executor::Operator(Box::new(FakeNlpEntity {
            attributes: attributes.clone(),
            output_schema: args.output_schema.clone(),
        })))
    }
    Arc::new(FnFactory::new("NlpEntity", create))
}

/// Builtins plus the fake NLP executor.
pub fn registry_with_nlp() -> ExecutorRegistry {
    let registry = ExecutorRegistry::with_builtins();
    registry.register(fake_nlp_factory());
    registry
}

/// Lifecycle calls observed by [`CountingSource`].
#[derive(Debug, Default)]
pub struct SourceCalls {
    pub opens: AtomicUsize,
    pub pulls: AtomicUsize,
    pub closes: AtomicUsize,
}

impl SourceCalls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Scan source that records its lifecycle and can fail after `fail_after` pulls.
pub struct CountingSource {
    rows: std::vec::IntoIter<Tuple>,
    calls: Arc<SourceCalls>,
    fail_after: Option<usize>,
}

impl SourceExecutor for CountingSource {
    fn open(&mut self) -> Result<()> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let n = self.calls.pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| n >= limit) {
            return Err(TextflowError::Execution("scan failed".to_string()));
        }
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registry whose `ScanSource` yields `rows` through a [`CountingSource`].
pub fn counting_registry(
    rows: Vec<Tuple>,
    fail_after: Option<usize>,
) -> (ExecutorRegistry, Arc<SourceCalls>) {
    let calls = Arc::new(SourceCalls::default());
    let registry = ExecutorRegistry::with_builtins();
    let shared = Arc::clone(&calls);
    registry.register(Arc::new(FnFactory::new(
        "ScanSource",
        move |_args: ExecutorArgs<'_>| {
            Ok(Executor::Source(Box::new(CountingSource {
                rows: rows.clone().into_iter(),
                calls: Arc::clone(&shared),
                fail_after,
            })))
        },
    )));
    (registry, calls)
}
