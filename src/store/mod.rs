// src/store/mod.rs
pub mod memory;
pub mod parquet_dir;

use std::fmt;
use thiserror::Error;

use crate::import::UserRecord;

pub use self::memory::MemoryStore;
pub use self::parquet_dir::ParquetStore;

/// Durable identity handed out by a store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("encoding JSON column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scanning store directory: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("invalid store path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("corrupt store data: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Persistence capability used by the importer.
///
/// Calls are blocking; the importer runs them on tokio's blocking pool, so
/// implementations must be safe to call from many threads at once.
pub trait UserStore: Send + Sync + 'static {
    fn insert(&self, user: &UserRecord) -> Result<RecordId, StoreError>;

    /// Every stored age, across all imports. Rows without an age yield `None`.
    fn all_ages(&self) -> Result<Vec<Option<f64>>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}
