#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use textflow_common::{AttributeType, Schema, SchemaRef};
use textflow_planner::{
    KeywordMatchingType, LogicalPlan, NlpEntityType, OperatorDescriptor, OperatorKind,
    OperatorLink,
};

pub const TEST_TABLE: &str = "logical_plan_test_table";

pub const KEYWORD_SOURCE_ID: &str = "keyword source";
pub const REGEX_ID: &str = "regex";
pub const FUZZY_TOKEN_ID: &str = "fuzzy token";
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

pub fn catalog() -> HashMap<String, SchemaRef> {
    HashMap::from([(TEST_TABLE.to_string(), test_schema())])
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

pub fn fuzzy_token() -> OperatorDescriptor {
    OperatorDescriptor::new(
        FUZZY_TOKEN_ID,
        OperatorKind::FuzzyTokenMatcher {
            query: "university college school".to_string(),
            attributes: vec!["content".to_string()],
            threshold: 0.5,
            result_attribute: "fuzzyTokenResults".to_string(),
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

pub const JOIN_DISTANCE_ID_2: &str = "join distance 2";

/// KeywordSource -> {RegexMatcher, NlpEntity, FuzzyToken};
/// {RegexMatcher, NlpEntity} -> Join1; {Join1, FuzzyToken} -> Join2 -> TupleSink
pub fn logical_plan_3() -> LogicalPlan {
    plan(
        vec![
            keyword_source(),
            regex(),
            nlp_entity(),
            fuzzy_token(),
            join_distance(),
            join_distance().with_id(JOIN_DISTANCE_ID_2),
            tuple_sink(),
        ],
        &[
            (KEYWORD_SOURCE_ID, REGEX_ID),
            (KEYWORD_SOURCE_ID, NLP_ENTITY_ID),
            (KEYWORD_SOURCE_ID, FUZZY_TOKEN_ID),
            (REGEX_ID, JOIN_DISTANCE_ID),
            (NLP_ENTITY_ID, JOIN_DISTANCE_ID),
            (JOIN_DISTANCE_ID, JOIN_DISTANCE_ID_2),
            (FUZZY_TOKEN_ID, JOIN_DISTANCE_ID_2),
            (JOIN_DISTANCE_ID_2, TUPLE_SINK_ID),
        ],
    )
}
