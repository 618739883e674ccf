//! Built-in executors for the reference operator kinds.
//!
//! `NlpEntity` and `PythonUdf` need external runtimes and ship no executor;
//! embedders register their own factories under those tags.

use std::sync::Arc;

use textflow_common::{Field, Result, SchemaRef, TextflowError, Tuple};

use crate::executor::{Executor, ExecutorArgs};
use crate::registry::{ExecutorFactory, FnFactory};

mod join;
mod matcher;
mod projection;
mod sink;
mod source;
mod word_count;

/// Factories for every operator kind with a built-in executor.
pub fn builtin_factories() -> Vec<Arc<dyn ExecutorFactory>> {
    vec![
        factory("ScanSource", source::scan_source),
        factory("KeywordSource", source::keyword_source),
        factory("KeywordMatcher", matcher::keyword_matcher),
        factory("RegexMatcher", matcher::regex_matcher),
        factory("FuzzyTokenMatcher", matcher::fuzzy_token_matcher),
        factory("Projection", projection::projection),
        factory("TypeCasting", projection::type_casting),
        factory("Join", join::join),
        factory("WordCountPartial", word_count::word_count_partial),
        factory("WordCloud", word_count::word_cloud),
        factory("TupleSink", sink::tuple_sink),
    ]
}

fn factory(
    name: &'static str,
    create: fn(ExecutorArgs<'_>) -> Result<Executor>,
) -> Arc<dyn ExecutorFactory> {
    Arc::new(FnFactory::new(name, create))
}

/// A factory was handed a descriptor of another kind.
fn kind_mismatch(args: &ExecutorArgs<'_>, expected: &str) -> TextflowError {
    TextflowError::Execution(format!(
        "operator {}: {expected} executor cannot run a {} descriptor",
        args.id(),
        args.descriptor.kind.tag()
    ))
}

fn input_schema<'a>(args: &ExecutorArgs<'a>, index: usize) -> Result<&'a SchemaRef> {
    args.input_schemas.get(index).ok_or_else(|| {
        TextflowError::Execution(format!(
            "operator {}: missing input schema {index}",
            args.id()
        ))
    })
}

/// `tuple` with `field` appended, bound to `schema`.
fn append_field(tuple: &Tuple, schema: &SchemaRef, field: Field) -> Result<Tuple> {
    let mut fields = Vec::with_capacity(tuple.fields().len() + 1);
    fields.extend(tuple.fields().iter().cloned());
    fields.push(field);
    Tuple::new(schema.clone(), fields)
}

/// Text of a textual attribute, `None` when the field is null.
fn text_of<'t>(tuple: &'t Tuple, attribute: &str) -> Result<Option<&'t str>> {
    match tuple.field(attribute)? {
        Field::Null => Ok(None),
        _ => tuple.get_str(attribute).map(Some),
    }
}

/// A word of some text with its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub start: usize,
    pub end: usize,
    /// Lowercased word.
    pub term: String,
}

/// Split `text` into maximal alphanumeric runs.
pub(crate) fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                tokens.push(token(text, s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(token(text, s, text.len()));
    }
    tokens
}

fn token(text: &str, start: usize, end: usize) -> Token {
    Token {
        start,
        end,
        term: text[start..end].to_lowercase(),
    }
}
