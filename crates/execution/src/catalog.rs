//! Table access for source operators.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use textflow_common::{Result, SchemaRef, TextflowError, Tuple};
use textflow_planner::SchemaProvider;

/// Tables readable by source operators.
pub trait TableProvider: Send + Sync {
    /// Schema of a table.
    fn table_schema(&self, table: &str) -> Result<SchemaRef>;

    /// Every tuple of a table, in storage order.
    fn scan(&self, table: &str) -> Result<Vec<Tuple>>;
}

/// Adapts a [`TableProvider`] for schema inference.
pub struct CatalogSchemas<'a>(pub &'a dyn TableProvider);

impl SchemaProvider for CatalogSchemas<'_> {
    fn table_schema(&self, table: &str) -> Result<SchemaRef> {
        self.0.table_schema(table)
    }
}

#[derive(Debug, Clone)]
struct MemTable {
    schema: SchemaRef,
    rows: Arc<Vec<Tuple>>,
}

/// In-memory table catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a table. Every row must be bound to `schema`.
    pub fn register_table(
        &self,
        name: impl Into<String>,
        schema: SchemaRef,
        rows: Vec<Tuple>,
    ) -> Result<()> {
        let name = name.into();
        if let Some(bad) = rows.iter().position(|t| t.schema() != &schema) {
            return Err(TextflowError::InvalidConfig(format!(
                "table {name}: row {bad} does not match the table schema"
            )));
        }
        self.tables
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(
                name,
                MemTable {
                    schema,
                    rows: Arc::new(rows),
                },
            );
        Ok(())
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names = self
            .tables
            .read()
            .map(|m| m.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn table(&self, name: &str) -> Result<MemTable> {
        self.tables
            .read()
            .map_err(|_| lock_poisoned())?
            .get(name)
            .cloned()
            .ok_or_else(|| TextflowError::InvalidConfig(format!("unknown table: {name}")))
    }
}

impl TableProvider for MemoryCatalog {
    fn table_schema(&self, table: &str) -> Result<SchemaRef> {
        Ok(self.table(table)?.schema)
    }

    fn scan(&self, table: &str) -> Result<Vec<Tuple>> {
        Ok(self.table(table)?.rows.as_ref().clone())
    }
}

fn lock_poisoned() -> TextflowError {
    TextflowError::Execution("catalog lock poisoned".to_string())
}
