//! Volatile registry of uploaded tables.

use crate::table::Table;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use uuid::Uuid;

/// Opaque identifier handed out for an upload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UploadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UploadId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Source of fresh upload identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> UploadId;
}

/// Random UUID v4 identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> UploadId {
        UploadId(Uuid::new_v4().to_string())
    }
}

/// Maps upload identifiers to their tables for the lifetime of the process.
///
/// Entries are inserted before their identifier is returned and never change
/// afterwards, so readers only hold the lock long enough to clone an [`Arc`].
/// There is no eviction: every upload stays until the process exits.
pub struct UploadStore {
    tables: RwLock<HashMap<UploadId, Arc<Table>>>,
    ids: Box<dyn IdGenerator>,
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadStore {
    pub fn new() -> Self {
        Self::with_id_generator(UuidGenerator)
    }

    pub fn with_id_generator(ids: impl IdGenerator + 'static) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            ids: Box::new(ids),
        }
    }

    /// Stores `table` under a fresh identifier.
    pub fn put(&self, table: Table) -> UploadId {
        let table = Arc::new(table);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut id = self.ids.generate();
        while tables.contains_key(&id) {
            id = self.ids.generate();
        }
        debug!("Storing upload {} ({} rows)", id, table.len());
        tables.insert(id.clone(), table);
        id
    }

    /// The table stored under `id`, `None` when unknown.
    pub fn get(&self, id: &UploadId) -> Option<Arc<Table>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Number of stored uploads.
    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
