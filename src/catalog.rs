use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::common::{DbError, PageId, Result};

/// Metadata for one table: its name, the page id of its index root and the
/// free-form schema string it was created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    /// Stored as i32 so the sidecar keeps a stable textual representation;
    /// -1 would mean an empty tree.
    pub root_page_id: i32,
    pub schema: String,
}

impl TableMeta {
    pub fn root(&self) -> PageId {
        PageId::new(self.root_page_id)
    }
}

/// Table catalog persisted as a JSON sidecar next to the page file. Every
/// mutation is written through immediately; a missing sidecar simply means
/// an empty catalog.
pub struct Catalog {
    tables: RwLock<HashMap<String, TableMeta>>,
    meta_path: PathBuf,
}

impl Catalog {
    pub fn open<P: AsRef<Path>>(meta_path: P) -> Result<Self> {
        let meta_path = meta_path.as_ref().to_path_buf();
        let tables = match File::open(&meta_path) {
            Ok(file) => serde_json::from_reader(file)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            tables: RwLock::new(tables),
            meta_path,
        })
    }

    fn save_locked(&self, tables: &HashMap<String, TableMeta>) -> Result<()> {
        let file = File::create(&self.meta_path)?;
        serde_json::to_writer(file, tables)?;
        Ok(())
    }

    /// Registers a new table. Fails when the name is taken.
    pub fn create_table(&self, name: &str, schema: &str, root: PageId) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        tables.insert(
            name.to_string(),
            TableMeta {
                name: name.to_string(),
                root_page_id: root.as_i32(),
                schema: schema.to_string(),
            },
        );
        self.save_locked(&tables)
    }

    pub fn get_table(&self, name: &str) -> Option<TableMeta> {
        self.tables.read().get(name).cloned()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Records a root id change after a split or root collapse moved it.
    pub fn update_table_root(&self, name: &str, new_root: PageId) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.get_mut(name) {
            Some(meta) => meta.root_page_id = new_root.as_i32(),
            None => return Err(DbError::TableNotFound(name.to_string())),
        }
        self.save_locked(&tables)
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.remove(name).is_none() {
            return Err(DbError::TableNotFound(name.to_string()));
        }
        self.save_locked(&tables)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Rewrites the sidecar from current state.
    pub fn save(&self) -> Result<()> {
        let tables = self.tables.read();
        self.save_locked(&tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_catalog() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();
        assert!(catalog.table_names().is_empty());
        assert!(!catalog.has_table("users"));
    }

    #[test]
    fn test_create_and_get() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog
            .create_table("users", "id int, name text", PageId::new(3))
            .unwrap();

        let meta = catalog.get_table("users").unwrap();
        assert_eq!(meta.name, "users");
        assert_eq!(meta.root(), PageId::new(3));
        assert_eq!(meta.schema, "id int, name text");
    }

    #[test]
    fn test_duplicate_table() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog.create_table("t", "id int", PageId::new(0)).unwrap();
        assert!(matches!(
            catalog.create_table("t", "id int", PageId::new(1)),
            Err(DbError::TableExists(_))
        ));
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.json");

        {
            let catalog = Catalog::open(&path).unwrap();
            catalog.create_table("t", "id int", PageId::new(5)).unwrap();
            catalog.update_table_root("t", PageId::new(9)).unwrap();
        }

        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.get_table("t").unwrap().root(), PageId::new(9));
    }

    #[test]
    fn test_drop_table() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog.create_table("t", "id int", PageId::new(0)).unwrap();
        catalog.drop_table("t").unwrap();
        assert!(!catalog.has_table("t"));
        assert!(matches!(
            catalog.drop_table("t"),
            Err(DbError::TableNotFound(_))
        ));
    }
}
