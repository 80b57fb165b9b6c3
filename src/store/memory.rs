// src/store/memory.rs
use std::sync::Mutex;

use super::{RecordId, StoreError, UserStore};
use crate::import::UserRecord;

#[derive(Default)]
struct Inner {
    next_id: u64,
    rows: Vec<(RecordId, UserRecord)>,
}

/// Process-local store; contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row, in insertion order.
    pub fn rows(&self) -> Result<Vec<(RecordId, UserRecord)>, StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.rows.clone())
    }
}

impl UserStore for MemoryStore {
    fn insert(&self, user: &UserRecord) -> Result<RecordId, StoreError> {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        guard.next_id += 1;
        let id = RecordId(guard.next_id);
        guard.rows.push((id, user.clone()));
        Ok(id)
    }

    fn all_ages(&self) -> Result<Vec<Option<f64>>, StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.rows.iter().map(|(_, u)| u.age).collect())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.rows.len() as u64)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        guard.rows.clear();
        Ok(())
    }
}
