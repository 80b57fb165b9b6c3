// src/import/mod.rs
pub mod distribution;
pub mod record;

use serde::Serialize;
use std::{fmt, path::Path, sync::Arc};
use thiserror::Error;
use tokio::{
    sync::watch,
    task::{JoinError, JoinSet},
};
use tracing::{error, info, warn};

use crate::parse::{parse_csv, ParseError, Record};
use crate::store::{RecordId, StoreError, UserStore};

pub use distribution::AgeDistribution;
pub use record::{UserRecord, ValidationError};

/// Records per batch. A batch is fully persisted before the next one starts.
pub const BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Idle,
    Parsing,
    Batching,
    Summarizing,
    Done,
    Failed,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStage::Idle => "idle",
            ImportStage::Parsing => "parsing",
            ImportStage::Batching => "batching",
            ImportStage::Summarizing => "summarizing",
            ImportStage::Done => "done",
            ImportStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("import worker failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub index: usize,
    pub submitted: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub distribution: AgeDistribution,
    pub inserted_count: usize,
    pub parsed_rows: usize,
    pub skipped: usize,
    pub batches: Vec<BatchSummary>,
}

/// Drives a CSV file through parsing, shaping and persistence.
///
/// Parsing runs on the blocking pool. Rows are then handled in batches of
/// `batch_size`: every row in a batch is shaped, validated and inserted on its
/// own task, and the batch is joined before the next one is spawned. Invalid
/// rows are logged and skipped; the first store error fails the import once
/// its batch has drained.
pub struct Importer {
    store: Arc<dyn UserStore>,
    batch_size: usize,
    stage: watch::Sender<ImportStage>,
}

impl Importer {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        let (stage, _) = watch::channel(ImportStage::Idle);
        Self {
            store,
            batch_size: BATCH_SIZE,
            stage,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Stage of the most recent import.
    pub fn stage(&self) -> ImportStage {
        *self.stage.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImportStage> {
        self.stage.subscribe()
    }

    fn enter(&self, next: ImportStage) {
        let prev = self.stage.send_replace(next);
        info!(from = %prev, to = %next, "import stage");
    }

    #[tracing::instrument(level = "info", skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn import_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportReport, ImportError> {
        match self.run(path.as_ref()).await {
            Ok(report) => {
                self.enter(ImportStage::Done);
                Ok(report)
            }
            Err(e) => {
                error!(stage = %self.stage(), error = %e, "import failed");
                self.enter(ImportStage::Failed);
                Err(e)
            }
        }
    }

    async fn run(&self, path: &Path) -> Result<ImportReport, ImportError> {
        self.enter(ImportStage::Parsing);
        let owned = path.to_path_buf();
        let rows = tokio::task::spawn_blocking(move || parse_csv(owned)).await??;
        let parsed_rows = rows.len();

        self.enter(ImportStage::Batching);
        let mut batches = Vec::new();
        let mut inserted_count = 0;
        let mut processed = 0;
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let batch: Vec<Record> = rows.by_ref().take(self.batch_size).collect();
            let summary = self.submit_batch(batches.len(), batch).await?;
            processed += summary.submitted;
            inserted_count += summary.inserted;
            info!(batch = summary.index, "inserted {} / {} records", processed, parsed_rows);
            batches.push(summary);
        }
        info!(inserted_count, "total records inserted");

        self.enter(ImportStage::Summarizing);
        let store = Arc::clone(&self.store);
        let ages = tokio::task::spawn_blocking(move || store.all_ages()).await??;
        let distribution = AgeDistribution::compute(&ages);
        for (bucket, percent) in distribution.buckets() {
            info!(bucket, percent, "age-group distribution");
        }

        Ok(ImportReport {
            distribution,
            inserted_count,
            parsed_rows,
            skipped: parsed_rows - inserted_count,
            batches,
        })
    }

    async fn submit_batch(&self, index: usize, batch: Vec<Record>) -> Result<BatchSummary, ImportError> {
        let submitted = batch.len();
        let mut tasks = JoinSet::new();

        for row in batch {
            let store = Arc::clone(&self.store);
            tasks.spawn_blocking(move || -> Result<Option<RecordId>, StoreError> {
                let user = UserRecord::from_generic(&row);
                if let Err(reason) = user.validate() {
                    let row = serde_json::to_string(&row).unwrap_or_default();
                    warn!(%reason, %row, "skipping invalid record");
                    return Ok(None);
                }
                store.insert(&user).map(Some)
            });
        }

        // drain the whole batch before reporting, even after a failure
        let mut inserted = 0;
        let mut failure: Option<ImportError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(_))) => inserted += 1,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    error!(batch = index, error = %e, "insert failed");
                    failure.get_or_insert(ImportError::from(e));
                }
                Err(e) => {
                    failure.get_or_insert(ImportError::from(e));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(BatchSummary {
                index,
                submitted,
                inserted,
            }),
        }
    }
}
