use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;
use parking_lot::RwLock;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{DbError, Result, DB_FILE, INVALID_PAGE_ID, META_FILE};
use crate::index::BPlusTree;
use crate::storage::disk::DiskManager;

/// The engine binds one database's disk manager, buffer pool and catalog
/// together and executes table-level operations against them.
///
/// A server process mounts exactly one database for its lifetime; the pool
/// and disk manager stay bound to it. Other databases under the data root
/// can be listed, created and dropped, but not selected - swapping the pool
/// underneath live tree handles is not supported, so `use` of an unmounted
/// database is refused rather than raced.
pub struct Engine {
    data_root: PathBuf,
    mounted_db: String,
    disk: Arc<DiskManager>,
    bpm: Arc<BufferPool>,
    catalog: Catalog,
    /// One shared tree handle per table. The handle's latch is what
    /// serializes mutations, so every session must go through the same
    /// instance rather than re-opening the tree from the catalog root.
    trees: RwLock<HashMap<String, Arc<BPlusTree>>>,
}

impl Engine {
    /// Opens (creating if needed) the database `db_name` under `data_root`
    /// and binds all shared resources to it.
    pub fn mount<P: AsRef<Path>>(data_root: P, db_name: &str, pool_size: usize) -> Result<Engine> {
        let data_root = data_root.as_ref().to_path_buf();
        let db_dir = data_root.join(db_name);
        fs::create_dir_all(&db_dir)?;

        let disk = Arc::new(DiskManager::open(db_dir.join(DB_FILE))?);
        let bpm = Arc::new(BufferPool::new(pool_size, Arc::clone(&disk)));
        let catalog = Catalog::open(db_dir.join(META_FILE))?;

        Ok(Engine {
            data_root,
            mounted_db: db_name.to_string(),
            disk,
            bpm,
            catalog,
            trees: RwLock::new(HashMap::new()),
        })
    }

    pub fn mounted_db(&self) -> &str {
        &self.mounted_db
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.bpm
    }

    // ---- database directory operations ----

    pub fn show_databases(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.data_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn create_database(&self, name: &str) -> Result<()> {
        let path = self.data_root.join(name);
        if path.exists() {
            return Err(DbError::DatabaseExists(name.to_string()));
        }
        fs::create_dir_all(path)?;
        Ok(())
    }

    pub fn drop_database(&self, name: &str) -> Result<()> {
        if name == self.mounted_db {
            return Err(DbError::DatabaseInUse(name.to_string()));
        }
        let path = self.data_root.join(name);
        if !path.exists() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        fs::remove_dir_all(path)?;
        Ok(())
    }

    /// Validates that `name` can be selected by a session. Only the mounted
    /// database qualifies; selecting any other existing database is refused.
    pub fn check_usable(&self, name: &str) -> Result<()> {
        if !self.data_root.join(name).exists() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        if name != self.mounted_db {
            return Err(DbError::DatabaseNotMounted {
                requested: name.to_string(),
                mounted: self.mounted_db.clone(),
            });
        }
        Ok(())
    }

    // ---- table operations ----

    fn tree_for(&self, table: &str) -> Result<Arc<BPlusTree>> {
        if let Some(tree) = self.trees.read().get(table) {
            return Ok(Arc::clone(tree));
        }

        let meta = self
            .catalog
            .get_table(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

        let mut trees = self.trees.write();
        let tree = trees
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(BPlusTree::new(meta.root(), Arc::clone(&self.bpm))));
        Ok(Arc::clone(tree))
    }

    pub fn create_table(&self, name: &str, schema: &str) -> Result<()> {
        let tree = BPlusTree::new(INVALID_PAGE_ID, Arc::clone(&self.bpm));
        tree.start_new_tree()?;
        let root = tree.root_page_id();

        if let Err(e) = self.catalog.create_table(name, schema, root) {
            // Duplicate name: release the page allocated for the orphan
            // root.
            self.bpm.delete_page(root);
            return Err(e);
        }
        self.trees
            .write()
            .insert(name.to_string(), Arc::new(tree));
        Ok(())
    }

    pub fn insert(&self, table: &str, key: i64, value: &str) -> Result<()> {
        let tree = self.tree_for(table)?;
        let old_root = tree.root_page_id();

        if !tree.insert(key, value.as_bytes())? {
            return Err(DbError::DuplicateKey(key));
        }

        let new_root = tree.root_page_id();
        if new_root != old_root {
            self.catalog.update_table_root(table, new_root)?;
        }
        Ok(())
    }

    pub fn select_all(&self, table: &str) -> Result<Vec<(i64, String)>> {
        let tree = self.tree_for(table)?;
        let mut rows = Vec::new();

        let Some(iter) = tree.begin()? else {
            return Ok(rows);
        };
        for entry in iter {
            let (key, value) = entry?;
            rows.push((key, display_value(&value)));
        }
        Ok(rows)
    }

    pub fn select_by_id(&self, table: &str, key: i64) -> Result<Option<String>> {
        let tree = self.tree_for(table)?;
        Ok(tree
            .get(key)?
            .map(|value| String::from_utf8_lossy(&value).into_owned()))
    }

    pub fn delete_row(&self, table: &str, key: i64) -> Result<bool> {
        let tree = self.tree_for(table)?;
        let old_root = tree.root_page_id();
        let removed = tree.remove(key)?;

        let new_root = tree.root_page_id();
        if new_root != old_root {
            self.catalog.update_table_root(table, new_root)?;
        }
        Ok(removed)
    }

    pub fn describe_table(&self, table: &str) -> Result<String> {
        let meta = self
            .catalog
            .get_table(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

        let mut out = String::new();
        out.push_str("+----------------+----------------------+\n");
        out.push_str(&format!("| Table          | {:<20} |\n", meta.name));
        out.push_str("+----------------+----------------------+\n");
        out.push_str(&format!("| Root Page ID   | {:<20} |\n", meta.root_page_id));
        out.push_str("| Schema Definition:                    |\n");
        out.push_str(&format!("  {}\n", meta.schema));
        out.push_str("+----------------+----------------------+");
        Ok(out)
    }

    /// Unregisters the table. Its pages are not reclaimed; the disk manager
    /// does not reuse ids.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.catalog.drop_table(table)?;
        self.trees.write().remove(table);
        Ok(())
    }

    pub fn table_names(&self) -> Vec<String> {
        self.catalog.table_names()
    }

    /// Flushes all dirty pages, persists the catalog and syncs the page
    /// file. Live tree handles are the authority on root ids; their current
    /// values are written back to the catalog first.
    pub fn close(&self) -> Result<()> {
        {
            let trees = self.trees.read();
            for (name, tree) in trees.iter() {
                if self.catalog.has_table(name) {
                    self.catalog.update_table_root(name, tree.root_page_id())?;
                }
            }
        }
        self.bpm.flush_all()?;
        self.catalog.save()?;
        self.disk.close()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("engine shutdown flush failed: {e}");
        }
    }
}

/// Strips the fixed-width zero padding for display.
fn display_value(value: &[u8]) -> String {
    let end = value.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&value[..end]).into_owned()
}

/// Per-connection view of the engine: shares all storage state but carries
/// its own database selection.
pub struct Session {
    engine: Arc<Engine>,
    current_db: Option<String>,
}

impl Session {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            current_db: None,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn current_db(&self) -> Option<&str> {
        self.current_db.as_deref()
    }

    pub fn use_database(&mut self, name: &str) -> Result<()> {
        self.engine.check_usable(name)?;
        self.current_db = Some(name.to_string());
        Ok(())
    }

    pub fn drop_database(&self, name: &str) -> Result<()> {
        if self.current_db.as_deref() == Some(name) {
            return Err(DbError::DatabaseInUse(name.to_string()));
        }
        self.engine.drop_database(name)
    }

    /// Table operations require a selected database.
    pub fn ensure_db_selected(&self) -> Result<&str> {
        self.current_db
            .as_deref()
            .ok_or(DbError::NoDatabaseSelected)
    }
}
