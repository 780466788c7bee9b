//! Open tables, keyed by table id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use atlas_table_core::logging::targets;

use crate::controller::{TableContext, TableController};
use crate::error::{Error, Result};
use crate::source::DisplaySource;

/// The set of tables an application has open.
///
/// A registry is created by the application and passed to whatever opens
/// and closes tables; there is no global instance.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, Arc<TableController>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a table and registers it under `context.table_id`.
    pub fn open(&self, context: TableContext, source: &DisplaySource) -> Result<Arc<TableController>> {
        let table_id = context.table_id.clone();
        if self.tables.read().contains_key(&table_id) {
            return Err(Error::TableAlreadyOpen(table_id));
        }
        let controller = Arc::new(TableController::open(context, source));
        self.insert(controller.clone())?;
        Ok(controller)
    }

    /// Registers an already opened table.
    pub fn insert(&self, controller: Arc<TableController>) -> Result<()> {
        let mut tables = self.tables.write();
        let table_id = controller.table_id().to_string();
        if tables.contains_key(&table_id) {
            controller.close();
            return Err(Error::TableAlreadyOpen(table_id));
        }
        tracing::debug!(target: targets::TABLE, table = %table_id, open = tables.len() + 1, "table registered");
        tables.insert(table_id, controller);
        Ok(())
    }

    pub fn get(&self, table_id: &str) -> Option<Arc<TableController>> {
        self.tables.read().get(table_id).cloned()
    }

    pub fn contains(&self, table_id: &str) -> bool {
        self.tables.read().contains_key(table_id)
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Closes and unregisters a table.
    pub fn close(&self, table_id: &str) -> Result<()> {
        let controller = self
            .tables
            .write()
            .remove(table_id)
            .ok_or_else(|| Error::TableNotOpen(table_id.to_string()))?;
        controller.close();
        Ok(())
    }

    /// Closes every table.
    pub fn close_all(&self) {
        let tables: Vec<_> = self.tables.write().drain().map(|(_, table)| table).collect();
        for table in tables {
            table.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnFilterConfigResolver, FieldInfo, FieldType, TableConfig};
    use crate::grid::tests::MemoryGrid;
    use crate::row::RowId;
    use crate::source::{ClassId, DisplaySourceKind, SymbolClassIndex};
    use std::collections::HashSet;

    struct NoClasses;

    impl SymbolClassIndex for NoClasses {
        fn row_ids_for_classes(&self, _classes: &HashSet<ClassId>) -> HashSet<RowId> {
            HashSet::new()
        }
    }

    fn context(table_id: &str) -> TableContext {
        let fields = [FieldInfo::new("OID", FieldType::Number)];
        TableContext {
            table_id: table_id.to_string(),
            id_field: "OID".to_string(),
            config: ColumnFilterConfigResolver::new(&fields)
                .resolve(&TableConfig::default())
                .unwrap(),
            grid: Arc::new(MemoryGrid::with_ids(3)),
            extent: None,
        }
    }

    fn source() -> DisplaySource {
        DisplaySource::new("lakes", DisplaySourceKind::Node, Arc::new(NoClasses))
    }

    #[test]
    fn test_open_get_close() {
        let registry = TableRegistry::new();
        let source = source();
        let table = registry.open(context("lakes"), &source).unwrap();
        assert!(registry.contains("lakes"));
        assert!(Arc::ptr_eq(&registry.get("lakes").unwrap(), &table));

        registry.close("lakes").unwrap();
        assert!(registry.is_empty());
        assert!(!table.is_open());
        assert_eq!(source.visibility_changed.connection_count(), 0);
        assert!(matches!(registry.close("lakes"), Err(Error::TableNotOpen(_))));
    }

    #[test]
    fn test_duplicate_open_rejected() {
        let registry = TableRegistry::new();
        let source = source();
        registry.open(context("lakes"), &source).unwrap();
        assert!(matches!(
            registry.open(context("lakes"), &source),
            Err(Error::TableAlreadyOpen(id)) if id == "lakes"
        ));
        assert_eq!(source.visibility_changed.connection_count(), 1);
    }

    #[test]
    fn test_close_all() {
        let registry = TableRegistry::new();
        let lakes = source();
        let rivers = source();
        let a = registry.open(context("lakes"), &lakes).unwrap();
        let b = registry.open(context("rivers"), &rivers).unwrap();
        assert_eq!(registry.len(), 2);

        registry.close_all();
        assert!(registry.is_empty());
        assert!(!a.is_open() && !b.is_open());
    }
}
