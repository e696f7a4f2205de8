use std::sync::Arc;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("descriptor has {got} values, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("descriptor contains non-finite values")]
    NonFinite,
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Where the serialized store lives. One blob per key, whole-value writes.
pub trait BlobStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl BlobStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        db::query::get_value(&conn, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        db::writer::set_value(&conn, key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        db::writer::remove_value(&conn, key)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledDescriptors {
    pub label: String,
    pub descriptors: Vec<Vec<f32>>,
}

/// Append-only label -> descriptors mapping, kept in registration order.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    entries: Vec<LabeledDescriptors>,
    dim: usize,
}

impl DescriptorStore {
    pub fn new(dim: usize) -> Self {
        Self { entries: Vec::new(), dim }
    }

    /// Loads whatever is persisted under `key`. A blob that fails to parse
    /// yields an empty store.
    pub fn load(storage: &dyn BlobStorage, key: &str, dim: usize) -> Result<Self> {
        let mut store = Self::new(dim);
        let Some(raw) = storage.get(key)? else {
            return Ok(store);
        };
        match serde_json::from_str::<Vec<LabeledDescriptors>>(&raw) {
            Ok(entries) => {
                info!(labels = entries.len(), "loaded registered faces");
                store.entries = entries;
            }
            Err(e) => {
                warn!("stored faces unreadable, starting empty: {}", e);
            }
        }
        Ok(store)
    }

    pub fn save(&self, storage: &dyn BlobStorage, key: &str) -> Result<()> {
        let raw = serde_json::to_string(&self.entries)?;
        storage.set(key, &raw)
    }

    pub fn clear(&mut self, storage: &dyn BlobStorage, key: &str) -> Result<()> {
        self.entries.clear();
        storage.remove(key)
    }

    /// Appends one sample and returns the label's new sample count.
    pub fn add_sample(&mut self, label: &str, descriptor: Vec<f32>) -> Result<usize, StoreError> {
        if descriptor.len() != self.dim {
            return Err(StoreError::DimensionMismatch { expected: self.dim, got: descriptor.len() });
        }
        if descriptor.iter().any(|v| !v.is_finite()) {
            return Err(StoreError::NonFinite);
        }
        if let Some(existing) = self.entries.iter_mut().find(|e| e.label == label) {
            existing.descriptors.push(descriptor);
            return Ok(existing.descriptors.len());
        }
        self.entries.push(LabeledDescriptors { label: label.to_string(), descriptors: vec![descriptor] });
        Ok(1)
    }

    pub fn sample_count(&self, label: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.descriptors.len())
            .unwrap_or(0)
    }

    pub fn entries(&self) -> &[LabeledDescriptors] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}
