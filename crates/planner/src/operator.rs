//! Operator descriptors: a tagged kind plus its configuration.
//!
//! Each kind has fixed declared arities and is mapped to a pure output-schema
//! rule in [`crate::analyzer`] and to an executor factory in the execution
//! runtime's registry, keyed by [`OperatorKind::tag`].

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use textflow_common::progressive;
use textflow_common::{
    Attribute, AttributeType, OperatorId, Result, Schema, SchemaRef, TextflowError,
};

/// Attribute holding a word in word-count results.
pub const WORD_ATTRIBUTE: &str = "word";
/// Attribute holding an occurrence count in word-count results.
pub const COUNT_ATTRIBUTE: &str = "count";

/// `(word STRING, count INTEGER)`, shared by every word-count operator instance.
pub fn word_count_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            Arc::new(
                Schema::builder()
                    .add(WORD_ATTRIBUTE, AttributeType::String)
                    .add(COUNT_ATTRIBUTE, AttributeType::Integer)
                    .build()
                    .expect("constant schema has unique names"),
            )
        })
        .clone()
}

/// Word-count schema behind the leading insertion/retraction flag.
pub fn word_cloud_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            Arc::new(
                progressive::flagged_schema(&word_count_schema())
                    .expect("constant schema has unique names"),
            )
        })
        .clone()
}

/// How keyword queries are matched against text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatchingType {
    /// Every query token must appear.
    #[default]
    Conjunction,
    /// Query must appear as a contiguous phrase.
    Phrase,
    /// Query must appear as a substring.
    Substring,
}

/// Entity classes an NLP entity operator can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NlpEntityType {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Person,
    Location,
    Organization,
    Money,
    Percent,
    Date,
    Time,
    NeAll,
}

/// Kind of work a Python UDF performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PythonUdfType {
    Map,
    Filter,
    SupervisedTraining,
    UnsupervisedTraining,
}

impl PythonUdfType {
    /// Map and filter UDFs see tuples independently; training needs all data on one node.
    pub fn supports_parallel(&self) -> bool {
        matches!(self, PythonUdfType::Map | PythonUdfType::Filter)
    }
}

fn default_udf_batch_size() -> usize {
    100
}

/// Closed set of operator kinds with their configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OperatorKind {
    /// Reads every tuple of a catalog table.
    ScanSource { table: String },
    /// Reads tuples of a table that match a keyword query.
    KeywordSource {
        table: String,
        query: String,
        attributes: Vec<String>,
        #[serde(default)]
        matching: KeywordMatchingType,
        result_attribute: String,
    },
    KeywordMatcher {
        query: String,
        attributes: Vec<String>,
        #[serde(default)]
        matching: KeywordMatchingType,
        result_attribute: String,
    },
    RegexMatcher {
        pattern: String,
        attributes: Vec<String>,
        result_attribute: String,
    },
    FuzzyTokenMatcher {
        query: String,
        attributes: Vec<String>,
        threshold: f64,
        result_attribute: String,
    },
    NlpEntity {
        entity_type: NlpEntityType,
        attributes: Vec<String>,
        result_attribute: String,
    },
    Projection { attributes: Vec<String> },
    TypeCasting {
        attribute: String,
        result_type: AttributeType,
    },
    PythonUdf {
        udf_type: PythonUdfType,
        #[serde(default)]
        script: Option<String>,
        #[serde(default)]
        input_columns: Vec<String>,
        #[serde(default)]
        output_columns: Vec<Attribute>,
        #[serde(default = "default_udf_batch_size")]
        batch_size: usize,
        /// Requested worker count, engine default when absent.
        #[serde(default)]
        workers: Option<usize>,
    },
    /// Two-input join. The first declared input link is the inner operand,
    /// the second the outer operand.
    Join {
        inner_attribute: String,
        outer_attribute: String,
        threshold: usize,
    },
    /// Per-batch word counts over a text attribute.
    WordCountPartial { attribute: String },
    /// Progressive top-N word counts, emitted as retraction/insertion deltas.
    WordCloud { top_n: usize },
    TupleSink,
}

impl OperatorKind {
    /// Registry key for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            OperatorKind::ScanSource { .. } => "ScanSource",
            OperatorKind::KeywordSource { .. } => "KeywordSource",
            OperatorKind::KeywordMatcher { .. } => "KeywordMatcher",
            OperatorKind::RegexMatcher { .. } => "RegexMatcher",
            OperatorKind::FuzzyTokenMatcher { .. } => "FuzzyTokenMatcher",
            OperatorKind::NlpEntity { .. } => "NlpEntity",
            OperatorKind::Projection { .. } => "Projection",
            OperatorKind::TypeCasting { .. } => "TypeCasting",
            OperatorKind::PythonUdf { .. } => "PythonUdf",
            OperatorKind::Join { .. } => "Join",
            OperatorKind::WordCountPartial { .. } => "WordCountPartial",
            OperatorKind::WordCloud { .. } => "WordCloud",
            OperatorKind::TupleSink => "TupleSink",
        }
    }

    pub fn input_arity(&self) -> usize {
        match self {
            OperatorKind::ScanSource { .. } | OperatorKind::KeywordSource { .. } => 0,
            OperatorKind::Join { .. } => 2,
            _ => 1,
        }
    }

    /// Declared output ports. A port may feed several consumers through a connector.
    pub fn output_arity(&self) -> usize {
        match self {
            OperatorKind::TupleSink => 0,
            _ => 1,
        }
    }

    pub fn is_source(&self) -> bool {
        self.input_arity() == 0
    }

    pub fn is_sink(&self) -> bool {
        self.output_arity() == 0
    }

    /// Worker count the runtime should use for this kind.
    ///
    /// Sources, joins, sinks and global aggregations run on one worker;
    /// stateless per-tuple operators use the engine default.
    pub fn workers(&self, id: &OperatorId, default_workers: usize) -> Result<usize> {
        let default_workers = default_workers.max(1);
        match self {
            OperatorKind::PythonUdf {
                udf_type, workers, ..
            } => match (udf_type.supports_parallel(), workers) {
                (true, Some(0)) => Err(TextflowError::InvalidConfig(format!(
                    "operator {id}: worker count must be at least 1"
                ))),
                (true, Some(n)) => Ok(*n),
                (true, None) => Ok(default_workers),
                (false, Some(n)) if *n > 1 => Err(TextflowError::InvalidConfig(format!(
                    "operator {id}: {udf_type:?} UDF must run on exactly one worker, requested {n}"
                ))),
                (false, _) => Ok(1),
            },
            OperatorKind::KeywordMatcher { .. }
            | OperatorKind::RegexMatcher { .. }
            | OperatorKind::FuzzyTokenMatcher { .. }
            | OperatorKind::NlpEntity { .. }
            | OperatorKind::Projection { .. }
            | OperatorKind::TypeCasting { .. }
            | OperatorKind::WordCountPartial { .. } => Ok(default_workers),
            OperatorKind::ScanSource { .. }
            | OperatorKind::KeywordSource { .. }
            | OperatorKind::Join { .. }
            | OperatorKind::WordCloud { .. }
            | OperatorKind::TupleSink => Ok(1),
        }
    }
}

/// A named operator node of a logical plan.
///
/// Descriptors are plain values: to place the same configuration under two
/// ids, clone it with [`OperatorDescriptor::with_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub id: OperatorId,
    #[serde(flatten)]
    pub kind: OperatorKind,
}

impl OperatorDescriptor {
    pub fn new(id: impl Into<OperatorId>, kind: OperatorKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Copy of this descriptor under a different id.
    pub fn with_id(&self, id: impl Into<OperatorId>) -> Self {
        Self {
            id: id.into(),
            kind: self.kind.clone(),
        }
    }

    pub fn input_arity(&self) -> usize {
        self.kind.input_arity()
    }

    pub fn output_arity(&self) -> usize {
        self.kind.output_arity()
    }
}
