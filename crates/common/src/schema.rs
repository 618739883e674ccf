//! Attribute/schema model shared by every operator.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextflowError};

/// Logical type of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    /// Short string matched as a whole.
    String,
    /// Free text that matchers tokenize.
    Text,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// Boolean.
    Boolean,
    /// Milliseconds since the unix epoch.
    Timestamp,
    /// List of match spans.
    List,
}

impl AttributeType {
    /// Upper-case type name as used in plan submissions.
    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "STRING",
            AttributeType::Text => "TEXT",
            AttributeType::Integer => "INTEGER",
            AttributeType::Long => "LONG",
            AttributeType::Double => "DOUBLE",
            AttributeType::Boolean => "BOOLEAN",
            AttributeType::Timestamp => "TIMESTAMP",
            AttributeType::List => "LIST",
        }
    }

    /// String-like attributes that text matchers can read.
    pub fn is_textual(&self) -> bool {
        matches!(self, AttributeType::String | AttributeType::Text)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name, unique within its schema.
    pub name: String,
    /// Attribute type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
        }
    }
}

/// Ordered, immutable sequence of attributes.
///
/// Attribute order is significant: tuples store fields positionally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

/// Shared schema handle.
pub type SchemaRef = Arc<Schema>;

impl Schema {
    /// Build a schema, rejecting duplicate attribute names.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(attributes.len());
        for a in &attributes {
            if !seen.insert(a.name.as_str()) {
                return Err(TextflowError::InvalidConfig(format!(
                    "duplicate attribute name `{}` in schema",
                    a.name
                )));
            }
        }
        Ok(Self { attributes })
    }

    /// Start an incremental schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Position of an attribute by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes of `self` followed by attributes of `other`.
    pub fn concat(&self, other: &Schema) -> Result<Schema> {
        let mut attrs = self.attributes.clone();
        attrs.extend(other.attributes.iter().cloned());
        Schema::new(attrs)
    }
}

/// Incremental [`Schema`] builder.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    attributes: Vec<Attribute>,
}

impl SchemaBuilder {
    pub fn add(mut self, name: impl Into<String>, attr_type: AttributeType) -> Self {
        self.attributes.push(Attribute::new(name, attr_type));
        self
    }

    pub fn add_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Append every attribute of an existing schema.
    pub fn add_schema(mut self, schema: &Schema) -> Self {
        self.attributes.extend(schema.attributes.iter().cloned());
        self
    }

    pub fn build(self) -> Result<Schema> {
        Schema::new(self.attributes)
    }
}
