use crate::constants::{
    ACCESS_REQUESTS_TREE, GRANTS_TREE, GRANT_HISTORY_TREE, PENDING_REQUESTS_TREE,
    RECORDS_TREE, RECORD_HEADS_TREE,
};
use crate::error::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Sled-backed storage for grants, requests, and holder records.
///
/// Implements [`ConsentStore`](crate::store::ConsentStore) and
/// [`RecordStore`](crate::store::RecordStore). Cloning is cheap; clones share
/// the same database.
#[derive(Clone)]
pub struct DbOperations {
    /// The underlying sled database instance
    db: sled::Db,
    /// Grant id -> grant
    pub(crate) grants_tree: sled::Tree,
    /// Pair key -> grant ids, oldest first
    pub(crate) grant_history_tree: sled::Tree,
    /// Request id -> request
    pub(crate) access_requests_tree: sled::Tree,
    /// Pair key -> id of its pending request
    pub(crate) pending_requests_tree: sled::Tree,
    /// Holder prefix + content id -> record
    pub(crate) records_tree: sled::Tree,
    /// Holder id -> content id of the current record
    pub(crate) record_heads_tree: sled::Tree,
}

impl DbOperations {
    /// Creates a new DbOperations instance with all required trees
    pub fn new(db: sled::Db) -> Result<Self, sled::Error> {
        let grants_tree = db.open_tree(GRANTS_TREE)?;
        let grant_history_tree = db.open_tree(GRANT_HISTORY_TREE)?;
        let access_requests_tree = db.open_tree(ACCESS_REQUESTS_TREE)?;
        let pending_requests_tree = db.open_tree(PENDING_REQUESTS_TREE)?;
        let records_tree = db.open_tree(RECORDS_TREE)?;
        let record_heads_tree = db.open_tree(RECORD_HEADS_TREE)?;

        Ok(Self {
            db,
            grants_tree,
            grant_history_tree,
            access_requests_tree,
            pending_requests_tree,
            records_tree,
            record_heads_tree,
        })
    }

    /// Opens (or creates) a database at `path`
    pub fn open<P: AsRef<std::path::Path>>(path: P, temporary: bool) -> StorageResult<Self> {
        let db = sled::Config::new()
            .path(path)
            .temporary(temporary)
            .open()?;
        Ok(Self::new(db)?)
    }

    /// Gets database statistics
    pub fn get_stats(&self) -> HashMap<String, u64> {
        let mut stats = HashMap::new();
        stats.insert("grants".to_string(), self.grants_tree.len() as u64);
        stats.insert(
            "connected_pairs".to_string(),
            self.grant_history_tree.len() as u64,
        );
        stats.insert(
            "access_requests".to_string(),
            self.access_requests_tree.len() as u64,
        );
        stats.insert(
            "pending_requests".to_string(),
            self.pending_requests_tree.len() as u64,
        );
        stats.insert("records".to_string(), self.records_tree.len() as u64);
        stats
    }

    // ========== GENERIC TREE OPERATIONS ==========

    /// Generic function to retrieve any deserializable item from a specific tree
    pub fn get_from_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        key: &str,
    ) -> StorageResult<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => {
                let item = serde_json::from_slice(&bytes).map_err(StorageError::serialization(key))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// List all values in a tree whose key starts with `prefix`
    pub fn list_items_with_prefix<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        prefix: &str,
    ) -> StorageResult<Vec<(String, T)>> {
        let mut items = Vec::new();
        for result in tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result?;
            let key_str = String::from_utf8_lossy(&key).to_string();
            let item = serde_json::from_slice(&value)
                .map_err(StorageError::serialization(&key_str))?;
            items.push((key_str, item));
        }
        Ok(items)
    }

    /// List all key-value pairs in a tree
    pub fn list_items_in_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
    ) -> StorageResult<Vec<(String, T)>> {
        self.list_items_with_prefix(tree, "")
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
