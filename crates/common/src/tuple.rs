//! Immutable row values bound to a schema.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextflowError};
use crate::schema::{AttributeType, SchemaRef};

/// One match produced by a text matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Attribute the match was found in.
    pub attribute: String,
    /// Byte offset of the first matched character.
    pub start: usize,
    /// Byte offset one past the last matched character.
    pub end: usize,
    /// Query term or entity type that produced the match.
    pub key: String,
    /// Matched text.
    pub value: String,
}

/// A single field value.
///
/// `Double` compares and hashes by bit pattern so tuples can live in hash sets
/// for delta computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Field {
    String(String),
    Text(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Timestamp(i64),
    List(Vec<Span>),
    Null,
}

impl Field {
    /// Type of the value, `None` for `Null`.
    pub fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Field::String(_) => Some(AttributeType::String),
            Field::Text(_) => Some(AttributeType::Text),
            Field::Integer(_) => Some(AttributeType::Integer),
            Field::Long(_) => Some(AttributeType::Long),
            Field::Double(_) => Some(AttributeType::Double),
            Field::Boolean(_) => Some(AttributeType::Boolean),
            Field::Timestamp(_) => Some(AttributeType::Timestamp),
            Field::List(_) => Some(AttributeType::List),
            Field::Null => None,
        }
    }

    fn type_name(&self) -> &'static str {
        self.attribute_type().map(|t| t.name()).unwrap_or("NULL")
    }

    /// Borrow string or text content.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::String(s) | Field::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::String(a), Field::String(b)) => a == b,
            (Field::Text(a), Field::Text(b)) => a == b,
            (Field::Integer(a), Field::Integer(b)) => a == b,
            (Field::Long(a), Field::Long(b)) => a == b,
            (Field::Double(a), Field::Double(b)) => a.to_bits() == b.to_bits(),
            (Field::Boolean(a), Field::Boolean(b)) => a == b,
            (Field::Timestamp(a), Field::Timestamp(b)) => a == b,
            (Field::List(a), Field::List(b)) => a == b,
            (Field::Null, Field::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Field::String(s) | Field::Text(s) => s.hash(state),
            Field::Integer(v) => v.hash(state),
            Field::Long(v) | Field::Timestamp(v) => v.hash(state),
            Field::Double(v) => v.to_bits().hash(state),
            Field::Boolean(v) => v.hash(state),
            Field::List(spans) => spans.hash(state),
            Field::Null => {}
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::String(s) | Field::Text(s) => write!(f, "{s}"),
            Field::Integer(v) => write!(f, "{v}"),
            Field::Long(v) | Field::Timestamp(v) => write!(f, "{v}"),
            Field::Double(v) => write!(f, "{v}"),
            Field::Boolean(v) => write!(f, "{v}"),
            Field::List(spans) => write!(f, "[{} spans]", spans.len()),
            Field::Null => write!(f, "null"),
        }
    }
}

/// Immutable row bound to exactly one schema.
///
/// Equality covers the schema and every field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    schema: SchemaRef,
    fields: Vec<Field>,
}

impl Tuple {
    /// Bind `fields` to `schema`, checking count and per-attribute type.
    ///
    /// `Field::Null` is accepted for any attribute type.
    pub fn new(schema: SchemaRef, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != schema.len() {
            return Err(TextflowError::Execution(format!(
                "tuple has {} fields but schema has {} attributes",
                fields.len(),
                schema.len()
            )));
        }
        for (attr, field) in schema.attributes().iter().zip(&fields) {
            match field.attribute_type() {
                Some(t) if t != attr.attr_type => {
                    return Err(TextflowError::FieldType {
                        attribute: attr.name.clone(),
                        expected: attr.attr_type.name().to_string(),
                        actual: t.name().to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(Self { schema, fields })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Field at a position.
    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Field by attribute name.
    pub fn field(&self, name: &str) -> Result<&Field> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| TextflowError::Execution(format!("tuple has no attribute `{name}`")))?;
        Ok(&self.fields[idx])
    }

    /// String or text content of an attribute.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        let field = self.field(name)?;
        field
            .as_str()
            .ok_or_else(|| type_error(name, "STRING or TEXT", field))
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        match self.field(name)? {
            Field::Integer(v) => Ok(*v),
            other => Err(type_error(name, "INTEGER", other)),
        }
    }

    pub fn get_long(&self, name: &str) -> Result<i64> {
        match self.field(name)? {
            Field::Long(v) => Ok(*v),
            Field::Integer(v) => Ok(i64::from(*v)),
            other => Err(type_error(name, "LONG", other)),
        }
    }

    pub fn get_double(&self, name: &str) -> Result<f64> {
        match self.field(name)? {
            Field::Double(v) => Ok(*v),
            other => Err(type_error(name, "DOUBLE", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.field(name)? {
            Field::Boolean(v) => Ok(*v),
            other => Err(type_error(name, "BOOLEAN", other)),
        }
    }

    pub fn get_spans(&self, name: &str) -> Result<&[Span]> {
        match self.field(name)? {
            Field::List(v) => Ok(v),
            other => Err(type_error(name, "LIST", other)),
        }
    }
}

fn type_error(attribute: &str, expected: &str, actual: &Field) -> TextflowError {
    TextflowError::FieldType {
        attribute: attribute.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (attr, field)) in self.schema.attributes().iter().zip(&self.fields).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", attr.name, field)?;
        }
        write!(f, ")")
    }
}
