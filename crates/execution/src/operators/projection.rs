use textflow_common::{AttributeType, Field, Result, SchemaRef, TextflowError, Tuple};
use textflow_planner::OperatorKind;

use super::{input_schema, kind_mismatch};
use crate::executor::{
    no_tuples, tuples, Executor, ExecutorArgs, InputEvent, OperatorExecutor, TupleIter,
};

struct ProjectionExec {
    indices: Vec<usize>,
    output_schema: SchemaRef,
}

impl OperatorExecutor for ProjectionExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        let InputEvent::Tuple { tuple, .. } = input else {
            return Ok(no_tuples());
        };
        let fields = self
            .indices
            .iter()
            .map(|&i| tuple.fields()[i].clone())
            .collect();
        Ok(tuples(vec![Tuple::new(self.output_schema.clone(), fields)?]))
    }
}

pub(crate) fn projection(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::Projection { attributes } = &args.descriptor.kind else {
        return Err(kind_mismatch(&args, "Projection"));
    };
    let input = input_schema(&args, 0)?;
    let indices = attributes
        .iter()
        .map(|name| {
            input
                .index_of(name)
                .ok_or_else(|| TextflowError::UnknownAttribute {
                    operator: args.id().clone(),
                    attribute: name.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Executor::Operator(Box::new(ProjectionExec {
        indices,
        output_schema: args.output_schema.clone(),
    })))
}

struct TypeCastingExec {
    index: usize,
    attribute: String,
    result_type: AttributeType,
    output_schema: SchemaRef,
}

impl OperatorExecutor for TypeCastingExec {
    fn process(&mut self, input: InputEvent) -> Result<TupleIter> {
        let InputEvent::Tuple { tuple, .. } = input else {
            return Ok(no_tuples());
        };
        let mut fields = tuple.into_fields();
        let cast = cast_field(&self.attribute, &fields[self.index], self.result_type)?;
        fields[self.index] = cast;
        Ok(tuples(vec![Tuple::new(self.output_schema.clone(), fields)?]))
    }
}

pub(crate) fn type_casting(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::TypeCasting {
        attribute,
        result_type,
    } = &args.descriptor.kind
    else {
        return Err(kind_mismatch(&args, "TypeCasting"));
    };
    let index = input_schema(&args, 0)?
        .index_of(attribute)
        .ok_or_else(|| TextflowError::UnknownAttribute {
            operator: args.id().clone(),
            attribute: attribute.clone(),
        })?;
    Ok(Executor::Operator(Box::new(TypeCastingExec {
        index,
        attribute: attribute.clone(),
        result_type: *result_type,
        output_schema: args.output_schema.clone(),
    })))
}

/// Convert one value. Null stays null; unparsable or out-of-range values
/// are a `FieldType` error.
fn cast_field(attribute: &str, value: &Field, to: AttributeType) -> Result<Field> {
    let fail = || TextflowError::FieldType {
        attribute: attribute.to_string(),
        expected: to.name().to_string(),
        actual: value.to_string(),
    };
    let cast = match (to, value) {
        (_, Field::Null) => Field::Null,
        (_, Field::List(_)) => return Err(fail()),

        (AttributeType::String, v) => Field::String(v.to_string()),

        (AttributeType::Integer, Field::Integer(v)) => Field::Integer(*v),
        (AttributeType::Integer, Field::Long(v) | Field::Timestamp(v)) => {
            Field::Integer(i32::try_from(*v).map_err(|_| fail())?)
        }
        (AttributeType::Integer, Field::Double(v)) => {
            if !v.is_finite() || *v < i32::MIN as f64 || *v > i32::MAX as f64 {
                return Err(fail());
            }
            Field::Integer(v.trunc() as i32)
        }
        (AttributeType::Integer, Field::Boolean(b)) => Field::Integer(i32::from(*b)),
        (AttributeType::Integer, Field::String(s) | Field::Text(s)) => {
            Field::Integer(s.trim().parse().map_err(|_| fail())?)
        }

        (AttributeType::Long, Field::Integer(v)) => Field::Long(i64::from(*v)),
        (AttributeType::Long, Field::Long(v) | Field::Timestamp(v)) => Field::Long(*v),
        (AttributeType::Long, Field::Double(v)) => {
            // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive.
            if !v.is_finite() || *v < i64::MIN as f64 || *v >= -(i64::MIN as f64) {
                return Err(fail());
            }
            Field::Long(v.trunc() as i64)
        }
        (AttributeType::Long, Field::Boolean(b)) => Field::Long(i64::from(*b)),
        (AttributeType::Long, Field::String(s) | Field::Text(s)) => {
            Field::Long(s.trim().parse().map_err(|_| fail())?)
        }

        (AttributeType::Double, Field::Integer(v)) => Field::Double(f64::from(*v)),
        (AttributeType::Double, Field::Long(v) | Field::Timestamp(v)) => Field::Double(*v as f64),
        (AttributeType::Double, Field::Double(v)) => Field::Double(*v),
        (AttributeType::Double, Field::Boolean(b)) => Field::Double(if *b { 1.0 } else { 0.0 }),
        (AttributeType::Double, Field::String(s) | Field::Text(s)) => {
            Field::Double(s.trim().parse().map_err(|_| fail())?)
        }

        (AttributeType::Boolean, Field::Boolean(b)) => Field::Boolean(*b),
        (AttributeType::Boolean, Field::Integer(v)) => Field::Boolean(*v != 0),
        (AttributeType::Boolean, Field::Long(v) | Field::Timestamp(v)) => Field::Boolean(*v != 0),
        (AttributeType::Boolean, Field::Double(v)) => Field::Boolean(*v != 0.0),
        (AttributeType::Boolean, Field::String(s) | Field::Text(s)) => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Field::Boolean(true),
                "false" | "0" => Field::Boolean(false),
                _ => return Err(fail()),
            }
        }

        _ => return Err(fail()),
    };
    Ok(cast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_between_scalars() {
        let s = Field::String(" 42 ".to_string());
        assert_eq!(
            cast_field("a", &s, AttributeType::Integer).unwrap(),
            Field::Integer(42)
        );
        assert_eq!(
            cast_field("a", &Field::Double(2.9), AttributeType::Long).unwrap(),
            Field::Long(2)
        );
        assert_eq!(
            cast_field("a", &Field::Integer(7), AttributeType::String).unwrap(),
            Field::String("7".to_string())
        );
        assert_eq!(
            cast_field("a", &Field::String("TRUE".into()), AttributeType::Boolean).unwrap(),
            Field::Boolean(true)
        );
        assert_eq!(
            cast_field("a", &Field::Null, AttributeType::Double).unwrap(),
            Field::Null
        );
    }

    #[test]
    fn bad_values_are_field_type_errors() {
        let err = cast_field("zip", &Field::String("9x".into()), AttributeType::Integer).unwrap_err();
        assert_eq!(err.kind(), "field_type");
        let err = cast_field("n", &Field::Long(i64::MAX), AttributeType::Integer).unwrap_err();
        assert_eq!(err.kind(), "field_type");
    }

    #[test]
    fn double_to_long_rejects_two_to_the_63() {
        let err = cast_field("n", &Field::Double(9_223_372_036_854_775_808.0), AttributeType::Long)
            .unwrap_err();
        assert_eq!(err.kind(), "field_type");
        assert_eq!(
            cast_field("n", &Field::Double(-9_223_372_036_854_775_808.0), AttributeType::Long)
                .unwrap(),
            Field::Long(i64::MIN)
        );
        assert_eq!(
            cast_field("n", &Field::Double(-2.75), AttributeType::Long).unwrap(),
            Field::Long(-2)
        );
    }
}
