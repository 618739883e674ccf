use std::collections::HashMap;
use std::sync::Arc;

use textflow_common::{
    Attribute, AttributeType, OperatorId, Result, Schema, SchemaRef, TextflowError,
};
use tracing::debug;

use crate::operator::{
    word_cloud_schema, word_count_schema, OperatorDescriptor, OperatorKind, PythonUdfType, COUNT_ATTRIBUTE,
    WORD_ATTRIBUTE,
};
use crate::validator::ValidatedPlan;

/// Source operators need table schemas to resolve attributes.
/// The orchestration layer provides this from its catalog.
pub trait SchemaProvider {
    /// Return schema for a table by name.
    fn table_schema(&self, table: &str) -> Result<SchemaRef>;
}

impl SchemaProvider for HashMap<String, SchemaRef> {
    fn table_schema(&self, table: &str) -> Result<SchemaRef> {
        self.get(table)
            .cloned()
            .ok_or_else(|| TextflowError::InvalidConfig(format!("unknown table: {table}")))
    }
}

/// Infer the output schema of every operator of a validated plan.
///
/// Operators are visited sources-first, so each one sees the already inferred
/// schemas of its inputs in link declaration order. The sink's entry is the
/// schema of the tuples it collects.
///
/// Error taxonomy:
/// - `UnknownAttribute`: configuration names an attribute the input lacks
/// - `DuplicateAttribute`: a produced attribute collides with an existing one
/// - `InvalidConfig`: other configuration problems (unknown table, bad type)
pub fn infer_schemas(
    plan: &ValidatedPlan,
    provider: &dyn SchemaProvider,
) -> Result<HashMap<OperatorId, SchemaRef>> {
    let mut schemas: HashMap<OperatorId, SchemaRef> = HashMap::with_capacity(plan.topo_order().len());
    for id in plan.topo_order() {
        let descriptor = plan.descriptor(id).ok_or_else(|| {
            TextflowError::Execution(format!("validated plan lost operator {id}"))
        })?;
        let inputs = plan
            .inputs_of(id)
            .iter()
            .map(|p| {
                schemas.get(p).cloned().ok_or_else(|| {
                    TextflowError::Execution(format!("schema of {p} not inferred before {id}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let schema = output_schema(descriptor, &inputs, provider)?;
        debug!(
            operator = "SchemaInference",
            op_id = %id,
            kind = descriptor.kind.tag(),
            attributes = schema.len(),
            "output schema inferred"
        );
        schemas.insert(id.clone(), schema);
    }
    Ok(schemas)
}

/// Output schema of one operator given its input schemas in declared order.
pub fn output_schema(
    descriptor: &OperatorDescriptor,
    inputs: &[SchemaRef],
    provider: &dyn SchemaProvider,
) -> Result<SchemaRef> {
    let id = &descriptor.id;
    if inputs.len() != descriptor.input_arity() {
        return Err(TextflowError::InvalidConfig(format!(
            "operator {id} expects {} input schemas, got {}",
            descriptor.input_arity(),
            inputs.len()
        )));
    }

    match &descriptor.kind {
        OperatorKind::ScanSource { table } => provider.table_schema(table),

        OperatorKind::KeywordSource {
            table,
            attributes,
            result_attribute,
            ..
        } => {
            let base = provider.table_schema(table)?;
            with_span_attribute(id, &base, attributes, result_attribute)
        }

        OperatorKind::KeywordMatcher {
            attributes,
            result_attribute,
            ..
        }
        | OperatorKind::RegexMatcher {
            attributes,
            result_attribute,
            ..
        }
        | OperatorKind::FuzzyTokenMatcher {
            attributes,
            result_attribute,
            ..
        }
        | OperatorKind::NlpEntity {
            attributes,
            result_attribute,
            ..
        } => with_span_attribute(id, &inputs[0], attributes, result_attribute),

        OperatorKind::Projection { attributes } => {
            let input = &inputs[0];
            let mut builder = Schema::builder();
            for name in attributes {
                let attr = input.attribute(name).ok_or_else(|| unknown(id, name))?;
                builder = builder.add_attribute(attr.clone());
            }
            build(id, builder.build())
        }

        OperatorKind::TypeCasting {
            attribute,
            result_type,
        } => {
            if !matches!(
                result_type,
                AttributeType::String
                    | AttributeType::Integer
                    | AttributeType::Long
                    | AttributeType::Double
                    | AttributeType::Boolean
            ) {
                return Err(TextflowError::InvalidConfig(format!(
                    "operator {id}: cannot cast to {result_type}"
                )));
            }
            let input = &inputs[0];
            if !input.contains(attribute) {
                return Err(unknown(id, attribute));
            }
            let attrs = input
                .attributes()
                .iter()
                .map(|a| {
                    if &a.name == attribute {
                        Attribute::new(a.name.clone(), *result_type)
                    } else {
                        a.clone()
                    }
                })
                .collect();
            build(id, Schema::new(attrs))
        }

        OperatorKind::PythonUdf {
            udf_type,
            input_columns,
            output_columns,
            ..
        } => {
            let input = &inputs[0];
            for c in input_columns {
                if !input.contains(c) {
                    return Err(unknown(id, c));
                }
            }
            let mut builder = match udf_type {
                PythonUdfType::SupervisedTraining => Schema::builder()
                    .add("class", AttributeType::String)
                    .add("precision", AttributeType::String)
                    .add("recall", AttributeType::String)
                    .add("f1-score", AttributeType::String)
                    .add("support", AttributeType::String),
                PythonUdfType::UnsupervisedTraining => {
                    Schema::builder().add("output", AttributeType::String)
                }
                PythonUdfType::Map | PythonUdfType::Filter => Schema::builder().add_schema(input),
            };
            for a in output_columns {
                if input.contains(&a.name) {
                    return Err(duplicate(id, &a.name));
                }
                builder = builder.add_attribute(a.clone());
            }
            build(id, builder.build())
        }

        OperatorKind::Join {
            inner_attribute,
            outer_attribute,
            ..
        } => {
            let (inner, outer) = (&inputs[0], &inputs[1]);
            if !inner.contains(inner_attribute) {
                return Err(unknown(id, inner_attribute));
            }
            if !outer.contains(outer_attribute) {
                return Err(unknown(id, outer_attribute));
            }
            // Attributes present on both sides describe the same document and
            // are kept once; the same name with a different type is a collision.
            let mut outer_only = Schema::builder();
            for a in outer.attributes() {
                match inner.attribute(&a.name) {
                    Some(existing) if existing.attr_type == a.attr_type => {}
                    Some(_) => return Err(duplicate(id, &a.name)),
                    None => outer_only = outer_only.add_attribute(a.clone()),
                }
            }
            build(id, outer_only.build().and_then(|o| inner.concat(&o)))
        }

        OperatorKind::WordCountPartial { attribute } => {
            let attr = inputs[0]
                .attribute(attribute)
                .ok_or_else(|| unknown(id, attribute))?;
            require_textual(id, attr)?;
            Ok(word_count_schema())
        }

        OperatorKind::WordCloud { top_n } => {
            if *top_n == 0 {
                return Err(TextflowError::InvalidConfig(format!(
                    "operator {id}: top_n must be at least 1"
                )));
            }
            let input = &inputs[0];
            for (name, ty) in [
                (WORD_ATTRIBUTE, AttributeType::String),
                (COUNT_ATTRIBUTE, AttributeType::Integer),
            ] {
                match input.attribute(name) {
                    Some(a) if a.attr_type == ty => {}
                    Some(a) => {
                        return Err(TextflowError::FieldType {
                            attribute: name.to_string(),
                            expected: ty.name().to_string(),
                            actual: a.attr_type.name().to_string(),
                        })
                    }
                    None => return Err(unknown(id, name)),
                }
            }
            Ok(word_cloud_schema())
        }

        OperatorKind::TupleSink => Ok(Arc::clone(&inputs[0])),
    }
}

// Matchers keep their input and append one span-list attribute.
fn with_span_attribute(
    id: &OperatorId,
    input: &SchemaRef,
    attributes: &[String],
    result_attribute: &str,
) -> Result<SchemaRef> {
    if attributes.is_empty() {
        return Err(TextflowError::InvalidConfig(format!(
            "operator {id}: at least one attribute to match is required"
        )));
    }
    for name in attributes {
        let attr = input.attribute(name).ok_or_else(|| unknown(id, name))?;
        require_textual(id, attr)?;
    }
    if input.contains(result_attribute) {
        return Err(duplicate(id, result_attribute));
    }
    build(
        id,
        Schema::builder()
            .add_schema(input)
            .add(result_attribute, AttributeType::List)
            .build(),
    )
}

fn require_textual(id: &OperatorId, attr: &Attribute) -> Result<()> {
    if attr.attr_type.is_textual() {
        Ok(())
    } else {
        Err(TextflowError::InvalidConfig(format!(
            "operator {id}: attribute `{}` is {}, expected STRING or TEXT",
            attr.name, attr.attr_type
        )))
    }
}

fn build(id: &OperatorId, schema: Result<Schema>) -> Result<SchemaRef> {
    schema.map(Arc::new).map_err(|e| match e {
        TextflowError::InvalidConfig(msg) => {
            TextflowError::InvalidConfig(format!("operator {id}: {msg}"))
        }
        other => other,
    })
}

fn unknown(id: &OperatorId, attribute: &str) -> TextflowError {
    TextflowError::UnknownAttribute {
        operator: id.clone(),
        attribute: attribute.to_string(),
    }
}

fn duplicate(id: &OperatorId, attribute: &str) -> TextflowError {
    TextflowError::DuplicateAttribute {
        operator: id.clone(),
        attribute: attribute.to_string(),
    }
}
