//! Text matchers: each appends the spans it finds as a LIST attribute and
//! drops tuples without any match.

use std::collections::BTreeSet;

use regex::Regex;
use textflow_common::{Field, Result, SchemaRef, Span, TextflowError, Tuple};
use textflow_planner::{KeywordMatchingType, OperatorKind};

use super::{append_field, kind_mismatch, text_of, tokenize};
use crate::executor::{
    no_tuples, tuples, Executor, ExecutorArgs, InputEvent, OperatorExecutor, TupleIter,
};

/// Finds spans inside the text of one attribute.
pub(crate) trait SpanFinder: Send {
    fn find(&self, attribute: &str, text: &str, out: &mut Vec<Span>);
}

/// Spans of every configured attribute of `tuple`.
pub(crate) fn find_spans(
    finder: &dyn SpanFinder,
    tuple: &Tuple,
    attributes: &[String],
) -> Result<Vec<Span>> {
    let mut spans = Vec::new();
    for attribute in attributes {
        if let Some(text) = text_of(tuple, attribute)? {
            finder.find(attribute, text, &mut spans);
        }
    }
    Ok(spans)
}

pub(crate) struct KeywordQuery {
    query: String,
    terms: Vec<String>,
    matching: KeywordMatchingType,
}

impl KeywordQuery {
    pub(crate) fn new(operator: &str, query: &str, matching: KeywordMatchingType) -> Result<Self> {
        let terms: Vec<String> = tokenize(query).into_iter().map(|t| t.term).collect();
        if terms.is_empty() {
            return Err(TextflowError::InvalidConfig(format!(
                "operator {operator}: keyword query must contain at least one word"
            )));
        }
        Ok(Self {
            query: query.to_string(),
            terms,
            matching,
        })
    }
}

impl SpanFinder for KeywordQuery {
    fn find(&self, attribute: &str, text: &str, out: &mut Vec<Span>) {
        let span = |start: usize, end: usize, key: &str| Span {
            attribute: attribute.to_string(),
            start,
            end,
            key: key.to_string(),
            value: text[start..end].to_string(),
        };
        match self.matching {
            KeywordMatchingType::Conjunction => {
                let tokens = tokenize(text);
                let mut found = Vec::new();
                for term in &self.terms {
                    let before = found.len();
                    found.extend(
                        tokens
                            .iter()
                            .filter(|t| &t.term == term)
                            .map(|t| span(t.start, t.end, term)),
                    );
                    if found.len() == before {
                        return;
                    }
                }
                found.sort_by_key(|s| (s.start, s.end));
                found.dedup();
                out.extend(found);
            }
            KeywordMatchingType::Phrase => {
                let tokens = tokenize(text);
                let n = self.terms.len();
                for window in tokens.windows(n) {
                    if window.iter().zip(&self.terms).all(|(t, q)| &t.term == q) {
                        out.push(span(window[0].start, window[n - 1].end, &self.query));
                    }
                }
            }
            KeywordMatchingType::Substring => {
                // ASCII folding keeps byte offsets aligned with `text`.
                let haystack = text.to_ascii_lowercase();
                let needle = self.query.to_ascii_lowercase();
                let mut from = 0;
                while let Some(pos) = haystack[from..].find(&needle) {
                    let start = from + pos;
                    out.push(span(start, start + needle.len(), &self.query));
                    from = start + needle.len().max(1);
                    while !haystack.is_char_boundary(from) {
                        from += 1;
                    }
                }
            }
        }
    }
}

struct RegexFinder {
    pattern: String,
    regex: Regex,
}

impl SpanFinder for RegexFinder {
    fn find(&self, attribute: &str, text: &str, out: &mut Vec<Span>) {
        out.extend(
            self.regex
                .find_iter(text)
                .filter(|m| !m.as_str().is_empty())
                .map(|m| Span {
                    attribute: attribute.to_string(),
                    start: m.start(),
                    end: m.end(),
                    key: self.pattern.clone(),
                    value: m.as_str().to_string(),
                }),
        );
    }
}

/// Matches when the share of distinct query words present in an attribute
/// reaches the threshold.
struct FuzzyTokenFinder {
    terms: BTreeSet<String>,
    threshold: f64,
}

impl SpanFinder for FuzzyTokenFinder {
    fn find(&self, attribute: &str, text: &str, out: &mut Vec<Span>) {
        let tokens = tokenize(text);
        let hits = tokens
            .iter()
            .filter(|t| self.terms.contains(&t.term))
            .collect::<Vec<_>>();
        let distinct: BTreeSet<&str> = hits.iter().map(|t| t.term.as_str()).collect();
        let ratio = distinct.len() as f64 / self.terms.len() as f64;
        if distinct.is_empty() || ratio < self.threshold {
            return;
        }
        out.extend(hits.into_iter().map(|t| Span {
            attribute: attribute.to_string(),
            start: t.start,
            end: t.end,
            key: t.term.clone(),
            value: text[t.start..t.end].to_string(),
        }));
    }
}

/// Shared executor of every matcher kind.
pub(crate) struct MatcherExec {
    finder: Box<dyn SpanFinder>,
    attributes: Vec<String>,
    output_schema: SchemaRef,
}

impl OperatorExecutor for MatcherExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        let InputEvent::Tuple { tuple, .. } = input else {
            return Ok(no_tuples());
        };
        let spans = find_spans(self.finder.as_ref(), &tuple, &self.attributes)?;
        if spans.is_empty() {
            return Ok(no_tuples());
        }
        let out = append_field(&tuple, &self.output_schema, Field::List(spans))?;
        Ok(tuples(vec![out]))
    }
}

fn matcher_exec(
    args: &ExecutorArgs<'_>,
    finder: Box<dyn SpanFinder>,
    attributes: &[String],
) -> Executor {
    Executor::Operator(Box::new(MatcherExec {
        finder,
        attributes: attributes.to_vec(),
        output_schema: args.output_schema.clone(),
    }))
}

pub(crate) fn keyword_matcher(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::KeywordMatcher {
        query,
        attributes,
        matching,
        ..
    } = &args.descriptor.kind
    else {
        return Err(kind_mismatch(&args, "KeywordMatcher"));
    };
    let finder = KeywordQuery::new(args.id().as_str(), query, *matching)?;
    Ok(matcher_exec(&args, Box::new(finder), attributes))
}

pub(crate) fn regex_matcher(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::RegexMatcher {
        pattern,
        attributes,
        ..
    } = &args.descriptor.kind
    else {
        return Err(kind_mismatch(&args, "RegexMatcher"));
    };
    let regex = Regex::new(pattern).map_err(|e| {
        TextflowError::InvalidConfig(format!(
            "operator {}: invalid regex `{pattern}`: {e}",
            args.id()
        ))
    })?;
    let finder = RegexFinder {
        pattern: pattern.clone(),
        regex,
    };
    Ok(matcher_exec(&args, Box::new(finder), attributes))
}

pub(crate) fn fuzzy_token_matcher(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::FuzzyTokenMatcher {
        query,
        attributes,
        threshold,
        ..
    } = &args.descriptor.kind
    else {
        return Err(kind_mismatch(&args, "FuzzyTokenMatcher"));
    };
    if !(*threshold > 0.0 && *threshold <= 1.0) {
        return Err(TextflowError::InvalidConfig(format!(
            "operator {}: threshold must be in (0, 1], got {threshold}",
            args.id()
        )));
    }
    let terms: BTreeSet<String> = tokenize(query).into_iter().map(|t| t.term).collect();
    if terms.is_empty() {
        return Err(TextflowError::InvalidConfig(format!(
            "operator {}: fuzzy query must contain at least one word",
            args.id()
        )));
    }
    let finder = FuzzyTokenFinder {
        terms,
        threshold: *threshold,
    };
    Ok(matcher_exec(&args, Box::new(finder), attributes))
}
