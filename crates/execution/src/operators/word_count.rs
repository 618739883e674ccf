//! Word cloud in two phases: per-worker partial counts over fixed-size
//! batches, then a single global top-N maintained as progressive deltas.

use std::collections::HashMap;

use textflow_common::{Field, Result, SchemaRef, Tuple};
use textflow_planner::{word_count_schema, OperatorKind, COUNT_ATTRIBUTE, WORD_ATTRIBUTE};

use super::{kind_mismatch, text_of, tokenize};
use crate::executor::{
    no_tuples, tuples, Executor, ExecutorArgs, InputEvent, OperatorExecutor, TupleIter,
};
use crate::incremental::IncrementalResultEngine;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Word counts in first-seen order.
#[derive(Debug, Default)]
struct Counts {
    index: HashMap<String, usize>,
    entries: Vec<(String, i32)>,
}

impl Counts {
    fn add(&mut self, word: &str, n: i32) {
        match self.index.get(word) {
            Some(&i) => self.entries[i].1 = self.entries[i].1.saturating_add(n),
            None => {
                self.index.insert(word.to_string(), self.entries.len());
                self.entries.push((word.to_string(), n));
            }
        }
    }

    fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }
}

fn count_tuple(schema: &SchemaRef, word: &str, count: i32) -> Result<Tuple> {
    Tuple::new(
        schema.clone(),
        vec![Field::String(word.to_string()), Field::Integer(count)],
    )
}

struct WordCountPartialExec {
    attribute: String,
    batch_size: usize,
    buffered: usize,
    counts: Counts,
    output_schema: SchemaRef,
}

impl WordCountPartialExec {
    fn flush(&mut self) -> Result<Vec<Tuple>> {
        let out = self
            .counts
            .entries
            .iter()
            .map(|(w, n)| count_tuple(&self.output_schema, w, *n))
            .collect::<Result<Vec<_>>>()?;
        self.counts.clear();
        self.buffered = 0;
        Ok(out)
    }
}

impl OperatorExecutor for WordCountPartialExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        match input {
            InputEvent::Tuple { tuple, .. } => {
                if let Some(text) = text_of(&tuple, &self.attribute)? {
                    for token in tokenize(text) {
                        if !STOP_WORDS.contains(&token.term.as_str()) {
                            self.counts.add(&token.term, 1);
                        }
                    }
                }
                self.buffered += 1;
                if self.buffered >= self.batch_size {
                    return Ok(tuples(self.flush()?));
                }
                Ok(no_tuples())
            }
            InputEvent::Exhausted { .. } => Ok(tuples(self.flush()?)),
        }
    }
}

pub(crate) fn word_count_partial(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::WordCountPartial { attribute } = &args.descriptor.kind else {
        return Err(kind_mismatch(&args, "WordCountPartial"));
    };
    Ok(Executor::Operator(Box::new(WordCountPartialExec {
        attribute: attribute.clone(),
        batch_size: args.ctx.config.partial_batch_size.max(1),
        buffered: 0,
        counts: Counts::default(),
        output_schema: args.output_schema.clone(),
    })))
}

struct WordCloudExec {
    top_n: usize,
    counts: Counts,
    engine: IncrementalResultEngine,
}

/// Top `n` words by count; ties keep first-seen order.
fn top_n(counts: &Counts, n: usize) -> Result<Vec<Tuple>> {
    let mut ranked: Vec<&(String, i32)> = counts.entries.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let schema = word_count_schema();
    ranked
        .into_iter()
        .take(n)
        .map(|(w, c)| count_tuple(&schema, w, *c))
        .collect()
}

impl OperatorExecutor for WordCloudExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        let top = self.top_n;
        let delta = match input {
            InputEvent::Tuple { tuple, .. } => {
                let word = tuple.get_str(WORD_ATTRIBUTE)?;
                let n = tuple.get_int(COUNT_ATTRIBUTE)?;
                self.counts.add(word, n);
                self.engine.record_input();
                let counts = &self.counts;
                self.engine.on_input(|| top_n(counts, top))?
            }
            InputEvent::Exhausted { .. } => {
                let counts = &self.counts;
                self.engine.on_exhausted(|| top_n(counts, top))?
            }
        };
        match delta {
            Some(delta) => Ok(tuples(delta.into_flagged()?)),
            None => Ok(no_tuples()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.counts.clear();
        Ok(())
    }
}

pub(crate) fn word_cloud(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::WordCloud { top_n } = &args.descriptor.kind else {
        return Err(kind_mismatch(&args, "WordCloud"));
    };
    Ok(Executor::Operator(Box::new(WordCloudExec {
        top_n: *top_n,
        counts: Counts::default(),
        engine: IncrementalResultEngine::new(args.ctx.update_interval()),
    })))
}
