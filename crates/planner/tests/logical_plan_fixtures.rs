mod support;

use std::collections::HashSet;

use support::*;
use textflow_common::{AritySide, OperatorId, ValidationError};
use textflow_planner::{
    create_physical_plan, infer_schemas, validate, OperatorKind, PhysicalInput, PhysicalNode,
    PhysicalPlan, PhysicalPlannerConfig,
};

fn build(plan: textflow_planner::LogicalPlan) -> PhysicalPlan {
    let validated = validate(plan).unwrap();
    create_physical_plan(&validated, &PhysicalPlannerConfig::default()).unwrap()
}

fn direct<'a>(node: &'a PhysicalNode, input: usize) -> &'a PhysicalNode {
    match &node.inputs[input] {
        PhysicalInput::Direct { node, .. } => node,
        other => panic!("expected direct input, got {other:?}"),
    }
}

fn endpoint(node: &PhysicalNode, input: usize) -> textflow_planner::EndpointRef {
    match &node.inputs[input] {
        PhysicalInput::Endpoint { endpoint, .. } => *endpoint,
        other => panic!("expected connector endpoint, got {other:?}"),
    }
}

fn id(s: &str) -> OperatorId {
    OperatorId::from(s)
}

#[test]
fn plan_1_builds_chain_without_connector() {
    let phys = build(logical_plan_1());
    assert!(phys.connectors.is_empty());

    let sink = &phys.root;
    assert_eq!(sink.id(), &id(TUPLE_SINK_ID));
    assert!(matches!(sink.operator.kind, OperatorKind::TupleSink));

    let regex = direct(sink, 0);
    assert!(matches!(regex.operator.kind, OperatorKind::RegexMatcher { .. }));

    let source = direct(regex, 0);
    assert!(matches!(source.operator.kind, OperatorKind::KeywordSource { .. }));
    assert!(source.inputs.is_empty());
    assert_eq!(phys.nodes().len(), 3);
}

#[test]
fn plan_2_shares_one_connector_between_join_operands() {
    let phys = build(logical_plan_2());
    assert_eq!(phys.connectors.len(), 1);

    let join = direct(&phys.root, 0);
    assert!(matches!(join.operator.kind, OperatorKind::Join { .. }));

    // First declared link is the inner operand.
    let inner = direct(join, 0);
    let outer = direct(join, 1);
    assert_eq!(inner.id(), &id(REGEX_ID));
    assert_eq!(outer.id(), &id(NLP_ENTITY_ID));

    let e1 = endpoint(inner, 0);
    let e2 = endpoint(outer, 0);
    assert_eq!(e1.connector, e2.connector);
    assert_ne!(e1.index, e2.index);

    let connector = phys.connector(e1.connector).unwrap();
    assert_eq!(connector.endpoints, 2);
    assert_eq!(connector.producer.id(), &id(KEYWORD_SOURCE_ID));
    assert_eq!(e1.index, 0);
    assert_eq!(e2.index, 1);
}

#[test]
fn plan_3_fans_out_three_ways_and_nests_joins() {
    let phys = build(logical_plan_3());
    assert_eq!(phys.connectors.len(), 1);

    let join2 = direct(&phys.root, 0);
    assert_eq!(join2.id(), &id(JOIN_DISTANCE_ID_2));
    let join1 = direct(join2, 0);
    let fuzzy = direct(join2, 1);
    assert_eq!(join1.id(), &id(JOIN_DISTANCE_ID));
    assert!(matches!(fuzzy.operator.kind, OperatorKind::FuzzyTokenMatcher { .. }));

    let regex = direct(join1, 0);
    let nlp = direct(join1, 1);
    assert!(matches!(regex.operator.kind, OperatorKind::RegexMatcher { .. }));
    assert!(matches!(nlp.operator.kind, OperatorKind::NlpEntity { .. }));

    let endpoints = [endpoint(regex, 0), endpoint(nlp, 0), endpoint(fuzzy, 0)];
    let indices: HashSet<usize> = endpoints.iter().map(|e| e.index).collect();
    assert_eq!(indices.len(), 3);
    assert!(endpoints.iter().all(|e| e.connector == endpoints[0].connector));

    let connector = phys.connector(endpoints[0].connector).unwrap();
    assert_eq!(connector.endpoints, 3);
    assert!(matches!(
        connector.producer.operator.kind,
        OperatorKind::KeywordSource { .. }
    ));
    assert_eq!(phys.nodes().len(), 7);
}

#[test]
fn valid_plans_infer_sink_schemas() {
    let validated = validate(logical_plan_3()).unwrap();
    let schemas = infer_schemas(&validated, &catalog()).unwrap();
    let sink = &schemas[&id(TUPLE_SINK_ID)];
    for name in [
        "city",
        "content",
        "keywordSourceResults",
        "regexResults",
        "nlpEntityResults",
        "fuzzyTokenResults",
    ] {
        assert!(sink.contains(name), "missing {name}");
    }
}

#[test]
fn plan_without_source_is_rejected() {
    let p = plan(vec![regex(), tuple_sink()], &[(REGEX_ID, TUPLE_SINK_ID)]);
    assert_eq!(
        validate(p).unwrap_err(),
        ValidationError::NoSource {
            operator: id(REGEX_ID)
        }
    );
}

#[test]
fn plan_without_sink_is_rejected() {
    let p = plan(
        vec![keyword_source(), regex()],
        &[(KEYWORD_SOURCE_ID, REGEX_ID)],
    );
    assert_eq!(validate(p).unwrap_err(), ValidationError::NoSink);
}

#[test]
fn plan_with_two_sinks_is_rejected() {
    let p = plan(
        vec![
            keyword_source(),
            regex(),
            tuple_sink(),
            tuple_sink().with_id("tuple sink 2"),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (REGEX_ID, TUPLE_SINK_ID),
            (REGEX_ID, "tuple sink 2"),
        ],
    );
    assert_eq!(
        validate(p).unwrap_err(),
        ValidationError::MultipleSink {
            sinks: vec![id(TUPLE_SINK_ID), id("tuple sink 2")]
        }
    );
}

#[test]
fn plan_with_disconnected_component_is_rejected() {
    let p = plan(
        vec![
            keyword_source(),
            regex(),
            tuple_sink(),
            regex().with_id("regex 2"),
            nlp_entity(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (REGEX_ID, TUPLE_SINK_ID),
            ("regex 2", NLP_ENTITY_ID),
        ],
    );
    assert!(matches!(
        validate(p).unwrap_err(),
        ValidationError::DisconnectedGraph { .. }
    ));
}

#[test]
fn plan_with_cycle_through_join_input_is_rejected() {
    let p = plan(
        vec![
            keyword_source(),
            regex(),
            tuple_sink(),
            regex().with_id("regex 2"),
            nlp_entity(),
            join_distance(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (REGEX_ID, JOIN_DISTANCE_ID),
            ("regex 2", NLP_ENTITY_ID),
            (NLP_ENTITY_ID, "regex 2"),
            (NLP_ENTITY_ID, JOIN_DISTANCE_ID),
            (JOIN_DISTANCE_ID, TUPLE_SINK_ID),
        ],
    );
    match validate(p).unwrap_err() {
        ValidationError::Cycle { operator } => {
            assert!(operator == id("regex 2") || operator == id(NLP_ENTITY_ID))
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn sink_with_two_inputs_is_an_input_arity_error() {
    let p = plan(
        vec![
            keyword_source(),
            keyword_source().with_id("keyword source 2"),
            regex(),
            regex().with_id("regex 2"),
            tuple_sink(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            ("keyword source 2", "regex 2"),
            (REGEX_ID, TUPLE_SINK_ID),
            ("regex 2", TUPLE_SINK_ID),
        ],
    );
    assert_eq!(
        validate(p).unwrap_err(),
        ValidationError::Arity {
            operator: id(TUPLE_SINK_ID),
            side: AritySide::Input,
            declared: 1,
            actual: 2,
        }
    );
}

#[test]
fn dangling_matcher_is_an_output_arity_error() {
    let p = plan(
        vec![
            keyword_source(),
            regex(),
            regex().with_id("regex 2"),
            tuple_sink(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (KEYWORD_SOURCE_ID, "regex 2"),
            (REGEX_ID, TUPLE_SINK_ID),
        ],
    );
    assert_eq!(
        validate(p).unwrap_err(),
        ValidationError::Arity {
            operator: id("regex 2"),
            side: AritySide::Output,
            declared: 1,
            actual: 0,
        }
    );
}

#[test]
fn source_sink_loop_is_a_cycle() {
    let p = plan(
        vec![keyword_source(), tuple_sink()],
        &[
            (KEYWORD_SOURCE_ID, TUPLE_SINK_ID),
            (TUPLE_SINK_ID, KEYWORD_SOURCE_ID),
        ],
    );
    assert!(matches!(
        validate(p).unwrap_err(),
        ValidationError::Cycle { .. }
    ));
}

#[test]
fn one_connector_per_fanning_producer() {
    // The source feeds two matchers; the first join feeds the second join
    // directly and again through the fuzzy matcher.
    let p = plan(
        vec![
            keyword_source(),
            regex(),
            nlp_entity(),
            join_distance(),
            fuzzy_token(),
            join_distance().with_id(JOIN_DISTANCE_ID_2),
            tuple_sink(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (KEYWORD_SOURCE_ID, NLP_ENTITY_ID),
            (REGEX_ID, JOIN_DISTANCE_ID),
            (NLP_ENTITY_ID, JOIN_DISTANCE_ID),
            (JOIN_DISTANCE_ID, JOIN_DISTANCE_ID_2),
            (JOIN_DISTANCE_ID, FUZZY_TOKEN_ID),
            (FUZZY_TOKEN_ID, JOIN_DISTANCE_ID_2),
            (JOIN_DISTANCE_ID_2, TUPLE_SINK_ID),
        ],
    );
    let phys = build(p);
    assert_eq!(phys.connectors.len(), 2);
    assert!(phys.connector_for(&id(KEYWORD_SOURCE_ID)).is_some());
    let shared_join = phys.connector_for(&id(JOIN_DISTANCE_ID)).unwrap();
    assert_eq!(shared_join.endpoints, 2);
    // Every operator is materialized exactly once.
    let ids: HashSet<_> = phys.nodes().iter().map(|n| n.id().clone()).collect();
    assert_eq!(ids.len(), 7);
    assert_eq!(phys.nodes().len(), 7);
}
