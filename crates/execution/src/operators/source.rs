use std::sync::Arc;

use textflow_common::{Field, OperatorId, Result, SchemaRef, TextflowError, Tuple};
use textflow_planner::OperatorKind;
use tracing::debug;

use super::matcher::{find_spans, KeywordQuery};
use super::{append_field, kind_mismatch};
use crate::catalog::TableProvider;
use crate::executor::{Executor, ExecutorArgs, SourceExecutor};

/// Reads a catalog table on open and yields its rows in storage order.
struct TableScan {
    operator: OperatorId,
    catalog: Arc<dyn TableProvider>,
    table: String,
    rows: std::vec::IntoIter<Tuple>,
}

impl TableScan {
    fn new(args: &ExecutorArgs<'_>, table: &str) -> Self {
        Self {
            operator: args.id().clone(),
            catalog: Arc::clone(&args.ctx.catalog),
            table: table.to_string(),
            rows: Vec::new().into_iter(),
        }
    }

    fn open(&mut self) -> Result<()> {
        let rows = self.catalog.scan(&self.table)?;
        debug!(operator = %self.operator, table = %self.table, rows = rows.len(), "table scan opened");
        self.rows = rows.into_iter();
        Ok(())
    }

    fn close(&mut self) {
        self.rows = Vec::new().into_iter();
    }
}

struct ScanSourceExec {
    scan: TableScan,
}

impl SourceExecutor for ScanSourceExec {
    fn open(&mut self) -> Result<()> {
        self.scan.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        Ok(self.scan.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        self.scan.close();
        Ok(())
    }
}

/// Table scan filtered by a keyword query, with the matches appended.
struct KeywordSourceExec {
    scan: TableScan,
    query: KeywordQuery,
    attributes: Vec<String>,
    output_schema: SchemaRef,
}

impl SourceExecutor for KeywordSourceExec {
    fn open(&mut self) -> Result<()> {
        self.scan.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        for tuple in self.scan.rows.by_ref() {
            let spans = find_spans(&self.query, &tuple, &self.attributes)?;
            if !spans.is_empty() {
                return append_field(&tuple, &self.output_schema, Field::List(spans)).map(Some);
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.scan.close();
        Ok(())
    }
}

pub(crate) fn scan_source(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::ScanSource { table } = &args.descriptor.kind else {
        return Err(kind_mismatch(&args, "ScanSource"));
    };
    Ok(Executor::Source(Box::new(ScanSourceExec {
        scan: TableScan::new(&args, table),
    })))
}

pub(crate) fn keyword_source(args: ExecutorArgs<'_>) -> Result<Executor> {
    let OperatorKind::KeywordSource {
        table,
        query,
        attributes,
        matching,
        ..
    } = &args.descriptor.kind
    else {
        return Err(kind_mismatch(&args, "KeywordSource"));
    };
    if attributes.is_empty() {
        return Err(TextflowError::InvalidConfig(format!(
            "operator {}: at least one attribute to match is required",
            args.id()
        )));
    }
    Ok(Executor::Source(Box::new(KeywordSourceExec {
        scan: TableScan::new(&args, table),
        query: KeywordQuery::new(args.id().as_str(), query, *matching)?,
        attributes: attributes.clone(),
        output_schema: args.output_schema.clone(),
    })))
}
