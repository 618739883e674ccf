//! Insertion/retraction flags for progressive results.
//!
//! A progressive operator emits deltas: each output tuple carries a leading
//! BOOLEAN attribute that is `true` for an insertion and `false` for a
//! retraction of a previously emitted tuple.

use std::sync::Arc;

use crate::error::{Result, TextflowError};
use crate::schema::{AttributeType, Schema, SchemaRef};
use crate::tuple::{Field, Tuple};

/// Name of the leading delta flag attribute.
pub const INSERTION_FLAG_ATTRIBUTE: &str = "__internal_is_insertion";

/// `schema` with the delta flag prepended.
pub fn flagged_schema(schema: &Schema) -> Result<Schema> {
    Schema::builder()
        .add(INSERTION_FLAG_ATTRIBUTE, AttributeType::Boolean)
        .add_schema(schema)
        .build()
}

pub fn add_insertion_flag(tuple: &Tuple) -> Result<Tuple> {
    add_flag(tuple, true)
}

pub fn add_retraction_flag(tuple: &Tuple) -> Result<Tuple> {
    add_flag(tuple, false)
}

fn add_flag(tuple: &Tuple, insertion: bool) -> Result<Tuple> {
    let schema = Arc::new(flagged_schema(tuple.schema())?);
    let mut fields = Vec::with_capacity(tuple.fields().len() + 1);
    fields.push(Field::Boolean(insertion));
    fields.extend(tuple.fields().iter().cloned());
    Tuple::new(schema, fields)
}

/// Whether a flagged tuple is an insertion.
pub fn is_insertion(tuple: &Tuple) -> Result<bool> {
    check_flagged(tuple)?;
    tuple.get_bool(INSERTION_FLAG_ATTRIBUTE)
}

/// Drop the delta flag, returning the plain result tuple.
pub fn strip_flag(tuple: &Tuple) -> Result<Tuple> {
    check_flagged(tuple)?;
    let attrs = tuple.schema().attributes()[1..].to_vec();
    let schema: SchemaRef = Arc::new(Schema::new(attrs)?);
    Tuple::new(schema, tuple.fields()[1..].to_vec())
}

fn check_flagged(tuple: &Tuple) -> Result<()> {
    match tuple.schema().attributes().first() {
        Some(a) if a.name == INSERTION_FLAG_ATTRIBUTE => Ok(()),
        _ => Err(TextflowError::Execution(format!(
            "tuple is not a progressive delta: missing leading `{INSERTION_FLAG_ATTRIBUTE}`"
        ))),
    }
}
