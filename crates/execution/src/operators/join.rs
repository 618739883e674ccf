//! Span-distance join between two matcher outputs over the same documents.
//!
//! An inner/outer pair joins when every attribute the two sides share
//! (other than span lists) holds the same value, and some inner span on
//! `inner_attribute` lies within `threshold` bytes of some outer span on
//! `outer_attribute` at both ends. Joined tuples carry the inner fields
//! followed by the outer-only fields.
//!
//! Both sides are buffered; each arriving tuple is probed against the other
//! side's buffer, so output is produced as soon as a pair is complete. A
//! side stops buffering once the opposite link is exhausted.

use std::sync::Arc;

use textflow_common::{
    AttributeType, Field, LinkIdentity, OperatorId, Result, Schema, SchemaRef, Span, TextflowError,
    Tuple,
};
use textflow_planner::OperatorKind;

use super::{input_schema, kind_mismatch};
use crate::executor::{
    no_tuples, tuples, Executor, ExecutorArgs, InputEvent, OperatorExecutor, TupleIter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Inner,
    Outer,
}

struct JoinExec {
    operator: OperatorId,
    inner_link: LinkIdentity,
    outer_link: LinkIdentity,
    inner_attribute: String,
    outer_attribute: String,
    threshold: usize,
    /// `(inner index, outer index)` of shared scalar attributes.
    keys: Vec<(usize, usize)>,
    /// Outer indices appended after the inner fields.
    outer_extra: Vec<usize>,
    inner_lists: Vec<usize>,
    outer_lists: Vec<usize>,
    output_schema: SchemaRef,
    inner: Vec<Tuple>,
    outer: Vec<Tuple>,
    inner_done: bool,
    outer_done: bool,
}

impl JoinExec {
    fn side_of(&self, link: &LinkIdentity) -> Result<Side> {
        if link == &self.inner_link {
            Ok(Side::Inner)
        } else if link == &self.outer_link {
            Ok(Side::Outer)
        } else {
            Err(TextflowError::Execution(format!(
                "operator {}: input from unexpected link {link}",
                self.operator
            )))
        }
    }

    fn spans<'t>(tuple: &'t Tuple, lists: &[usize], attribute: &'t str) -> Vec<&'t Span> {
        lists
            .iter()
            .filter_map(|&i| match &tuple.fields()[i] {
                Field::List(spans) => Some(spans),
                _ => None,
            })
            .flatten()
            .filter(|s| s.attribute == attribute)
            .collect()
    }

    fn matches(&self, inner: &Tuple, outer: &Tuple) -> bool {
        let same_document = self
            .keys
            .iter()
            .all(|&(i, o)| inner.fields()[i] == outer.fields()[o]);
        if !same_document {
            return false;
        }
        let inner_spans = Self::spans(inner, &self.inner_lists, &self.inner_attribute);
        let outer_spans = Self::spans(outer, &self.outer_lists, &self.outer_attribute);
        inner_spans.iter().any(|a| {
            outer_spans.iter().any(|b| {
                a.start.abs_diff(b.start) <= self.threshold && a.end.abs_diff(b.end) <= self.threshold
            })
        })
    }

    fn joined(&self, inner: &Tuple, outer: &Tuple) -> Result<Tuple> {
        let mut fields = Vec::with_capacity(self.output_schema.len());
        fields.extend(inner.fields().iter().cloned());
        fields.extend(self.outer_extra.iter().map(|&i| outer.fields()[i].clone()));
        Tuple::new(self.output_schema.clone(), fields)
    }

    fn probe(&self, side: Side, tuple: &Tuple) -> Result<Vec<Tuple>> {
        let mut out = Vec::new();
        match side {
            Side::Inner => {
                for outer in self.outer.iter().filter(|o| self.matches(tuple, o)) {
                    out.push(self.joined(tuple, outer)?);
                }
            }
            Side::Outer => {
                for inner in self.inner.iter().filter(|i| self.matches(i, tuple)) {
                    out.push(self.joined(inner, tuple)?);
                }
            }
        }
        Ok(out)
    }
}

impl OperatorExecutor for JoinExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        match input {
            InputEvent::Tuple { tuple, link } => {
                let side = self.side_of(&link)?;
                let out = self.probe(side, &tuple)?;
                match side {
                    Side::Inner if !self.outer_done => self.inner.push(tuple),
                    Side::Outer if !self.inner_done => self.outer.push(tuple),
                    _ => {}
                }
                Ok(tuples(out))
            }
            InputEvent::Exhausted { link } => {
                // The exhausted side's buffer is still probed by the other
                // side; the other side no longer needs one.
                match self.side_of(&link)? {
                    Side::Inner => {
                        self.inner_done = true;
                        self.outer.clear();
                    }
                    Side::Outer => {
                        self.outer_done = true;
                        self.inner.clear();
                    }
                }
                Ok(no_tuples())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.inner.clear();
        self.outer.clear();
        Ok(())
    }
}

pub(crate) fn join(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::Join {
        inner_attribute,
        outer_attribute,
        threshold,
    } = &args.descriptor.kind
    else {
        return Err(kind_mismatch(&args, "Join"));
    };
    let (inner_link, outer_link) = match args.input_links {
        [inner, outer] => (inner.clone(), outer.clone()),
        other => {
            return Err(TextflowError::Execution(format!(
                "operator {}: join needs 2 input links, got {}",
                args.id(),
                other.len()
            )))
        }
    };
    let inner = input_schema(&args, 0)?;
    let outer = input_schema(&args, 1)?;

    let lists_of = |schema: &SchemaRef| {
        schema
            .attributes()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.attr_type == AttributeType::List)
            .map(|(i, _)| i)
            .collect::<Vec<_>>()
    };
    let mut keys = Vec::new();
    let mut outer_extra = Vec::new();
    for (o, attr) in outer.attributes().iter().enumerate() {
        match inner.index_of(&attr.name) {
            Some(i) if attr.attr_type != AttributeType::List => keys.push((i, o)),
            Some(_) => {}
            None => outer_extra.push(o),
        }
    }
    let outer_only = Schema::new(
        outer_extra
            .iter()
            .map(|&o| outer.attributes()[o].clone())
            .collect(),
    )?;
    let output_schema: SchemaRef = Arc::new(inner.concat(&outer_only)?);
    if output_schema != *args.output_schema {
        return Err(TextflowError::Execution(format!(
            "operator {}: joined schema does not match the planned output schema",
            args.id()
        )));
    }

    Ok(Executor::Operator(Box::new(JoinExec {
        operator: args.id().clone(),
        inner_link,
        outer_link,
        inner_attribute: inner_attribute.clone(),
        outer_attribute: outer_attribute.clone(),
        threshold: *threshold,
        keys,
        outer_extra,
        inner_lists: lists_of(inner),
        outer_lists: lists_of(outer),
        output_schema,
        inner: Vec::new(),
        outer: Vec::new(),
        inner_done: false,
        outer_done: false,
    })))
}
