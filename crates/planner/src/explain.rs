use std::collections::HashSet;

use textflow_common::OperatorId;

use crate::operator::{OperatorDescriptor, OperatorKind};
use crate::physical_plan::{PhysicalInput, PhysicalNode, PhysicalPlan};
use crate::validator::ValidatedPlan;

/// Render a validated logical plan as an indented tree rooted at the sink.
///
/// A producer with several consumers is expanded under its first consumer
/// only; later occurrences are marked `shared`.
pub fn explain_logical(plan: &ValidatedPlan) -> String {
    let mut s = String::new();
    let mut expanded = HashSet::new();
    fmt_logical(plan, plan.sink(), 0, &mut expanded, &mut s);
    s
}

fn fmt_logical<'a>(
    plan: &'a ValidatedPlan,
    id: &'a OperatorId,
    indent: usize,
    expanded: &mut HashSet<&'a OperatorId>,
    out: &mut String,
) {
    let pad = "  ".repeat(indent);
    let Some(op) = plan.descriptor(id) else {
        out.push_str(&format!("{pad}{id} <missing>\n"));
        return;
    };
    if plan.outputs_of(id).len() > 1 && !expanded.insert(id) {
        out.push_str(&format!("{pad}{id} (shared)\n"));
        return;
    }
    out.push_str(&format!("{pad}{}\n", fmt_operator(op)));
    for input in plan.inputs_of(id) {
        fmt_logical(plan, input, indent + 1, expanded, out);
    }
}

/// Render a physical plan: the sink tree, then each connector with its producer.
pub fn explain_physical(plan: &PhysicalPlan) -> String {
    let mut s = String::new();
    fmt_physical(&plan.root, 0, &mut s);
    for c in &plan.connectors {
        s.push_str(&format!("{} endpoints={}\n", c.id, c.endpoints));
        fmt_physical(&c.producer, 1, &mut s);
    }
    s
}

fn fmt_physical(node: &PhysicalNode, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    out.push_str(&format!(
        "{pad}{} workers={}\n",
        fmt_operator(&node.operator),
        node.workers
    ));
    for input in &node.inputs {
        match input {
            PhysicalInput::Direct { node, .. } => fmt_physical(node, indent + 1, out),
            PhysicalInput::Endpoint { link, endpoint } => out.push_str(&format!(
                "{pad}  <- {}[{}] from {}\n",
                endpoint.connector, endpoint.index, link.from
            )),
        }
    }
}

fn fmt_operator(op: &OperatorDescriptor) -> String {
    let id = &op.id;
    match &op.kind {
        OperatorKind::ScanSource { table } => format!("{id}: ScanSource table={table}"),
        OperatorKind::KeywordSource {
            table,
            query,
            attributes,
            matching,
            result_attribute,
        } => format!(
            "{id}: KeywordSource table={table} query={query:?} matching={matching:?} on={attributes:?} as={result_attribute}"
        ),
        OperatorKind::KeywordMatcher {
            query,
            attributes,
            matching,
            result_attribute,
        } => format!(
            "{id}: KeywordMatcher query={query:?} matching={matching:?} on={attributes:?} as={result_attribute}"
        ),
        OperatorKind::RegexMatcher {
            pattern,
            attributes,
            result_attribute,
        } => format!("{id}: RegexMatcher pattern={pattern:?} on={attributes:?} as={result_attribute}"),
        OperatorKind::FuzzyTokenMatcher {
            query,
            attributes,
            threshold,
            result_attribute,
        } => format!(
            "{id}: FuzzyTokenMatcher query={query:?} threshold={threshold} on={attributes:?} as={result_attribute}"
        ),
        OperatorKind::NlpEntity {
            entity_type,
            attributes,
            result_attribute,
        } => format!("{id}: NlpEntity type={entity_type:?} on={attributes:?} as={result_attribute}"),
        OperatorKind::Projection { attributes } => format!("{id}: Projection {attributes:?}"),
        OperatorKind::TypeCasting {
            attribute,
            result_type,
        } => format!("{id}: TypeCasting {attribute} as {result_type}"),
        OperatorKind::PythonUdf {
            udf_type,
            output_columns,
            ..
        } => format!(
            "{id}: PythonUdf type={udf_type:?} outputs={}",
            output_columns.len()
        ),
        OperatorKind::Join {
            inner_attribute,
            outer_attribute,
            threshold,
        } => format!(
            "{id}: Join inner={inner_attribute} outer={outer_attribute} threshold={threshold}"
        ),
        OperatorKind::WordCountPartial { attribute } => format!("{id}: WordCountPartial {attribute}"),
        OperatorKind::WordCloud { top_n } => format!("{id}: WordCloud top_n={top_n}"),
        OperatorKind::TupleSink => format!("{id}: TupleSink"),
    }
}
