// src/store/parquet_dir.rs
use arrow::{
    array::{
        Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray, UInt64Array,
    },
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::Utc;
use glob::glob;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

use super::{RecordId, StoreError, UserStore};
use crate::import::UserRecord;
use crate::parse::{Record, Value};

/// Directory of Parquet files, one row per insert.
///
/// Each insert writes `user-<id>.parquet` through a `.tmp` file and a rename,
/// so readers never see a half-written row. [`ParquetStore::compact`] folds
/// the single-row files into one consolidated file.
///
/// `address` and `additional_info` are stored as JSON text.
pub struct ParquetStore {
    dir: PathBuf,
    schema: Arc<Schema>,
    last_id: Mutex<u64>,
}

fn users_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::UInt64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("age", DataType::Float64, true),
        Field::new("address", DataType::Utf8, true),
        Field::new("additional_info", DataType::Utf8, true),
        Field::new(
            "created_at",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
    ])
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| StoreError::Corrupt(format!("column `{}` missing or mistyped", name)))
}

fn opt_str(arr: &StringArray, row: usize) -> Option<&str> {
    (!arr.is_null(row)).then(|| arr.value(row))
}

impl ParquetStore {
    /// Open (or create) a store at `dir`. Existing files are scanned so new
    /// ids continue after the highest one on disk.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            schema: Arc::new(users_schema()),
            last_id: Mutex::new(0),
        };

        let mut max_id = 0u64;
        store.scan(|batch| {
            let ids = column::<UInt64Array>(batch, "id")?;
            if let Some(m) = ids.iter().flatten().max() {
                max_id = max_id.max(m);
            }
            Ok(())
        })?;
        *store.last_id.lock().map_err(|_| StoreError::Poisoned)? = max_id;

        info!(dir = %store.dir.display(), last_id = max_id, "opened parquet store");
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let pattern = format!("{}/*.parquet", dir);
        let mut files = Vec::new();
        for entry in glob(&pattern)? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn scan_files<F>(files: &[PathBuf], mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&RecordBatch) -> Result<(), StoreError>,
    {
        for p in files {
            let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(p)?)?
                .with_batch_size(1024)
                .build()?;
            for batch in reader {
                f(&batch?)?;
            }
        }
        Ok(())
    }

    fn scan<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnMut(&RecordBatch) -> Result<(), StoreError>,
    {
        Self::scan_files(&self.data_files()?, f)
    }

    /// Write `batches` to `name` inside the store directory via a temp file.
    fn write_file(&self, name: &str, batches: &[RecordBatch]) -> Result<PathBuf, StoreError> {
        let final_path = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));

        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), self.schema.clone(), None)?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.close()?;
        fs::rename(&tmp, &final_path)?;
        Ok(final_path)
    }

    /// Every stored row, decoded back into records.
    pub fn rows(&self) -> Result<Vec<(RecordId, UserRecord)>, StoreError> {
        let mut out = Vec::new();
        self.scan(|batch| {
            let ids = column::<UInt64Array>(batch, "id")?;
            let names = column::<StringArray>(batch, "name")?;
            let ages = column::<Float64Array>(batch, "age")?;
            let addresses = column::<StringArray>(batch, "address")?;
            let infos = column::<StringArray>(batch, "additional_info")?;

            for i in 0..batch.num_rows() {
                let address = opt_str(addresses, i)
                    .map(serde_json::from_str::<Value>)
                    .transpose()?;
                let additional_info = opt_str(infos, i)
                    .map(serde_json::from_str::<Record>)
                    .transpose()?;
                out.push((
                    RecordId(ids.value(i)),
                    UserRecord {
                        name: opt_str(names, i).map(str::to_string),
                        age: (!ages.is_null(i)).then(|| ages.value(i)),
                        address,
                        additional_info,
                    },
                ));
            }
            Ok(())
        })?;
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }

    /// Merge every data file into a single consolidated file, then remove the
    /// files that were merged. Rows inserted meanwhile are left in their own files.
    pub fn compact(&self) -> Result<usize, StoreError> {
        let files = self.data_files()?;
        if files.len() < 2 {
            return Ok(0);
        }

        let mut batches = Vec::new();
        let mut max_id = 0u64;
        Self::scan_files(&files, |batch| {
            let ids = column::<UInt64Array>(batch, "id")?;
            if let Some(m) = ids.iter().flatten().max() {
                max_id = max_id.max(m);
            }
            batches.push(batch.clone());
            Ok(())
        })?;

        let name = format!("consolidated-{:012}.parquet", max_id);
        let written = self.write_file(&name, &batches)?;

        for p in &files {
            if *p != written {
                fs::remove_file(p)?;
            }
        }
        info!(files = files.len(), into = %written.display(), "compacted parquet store");
        Ok(files.len())
    }
}

impl UserStore for ParquetStore {
    fn insert(&self, user: &UserRecord) -> Result<RecordId, StoreError> {
        let id = {
            let mut last = self.last_id.lock().map_err(|_| StoreError::Poisoned)?;
            *last += 1;
            *last
        };

        let address = user.address.as_ref().map(serde_json::to_string).transpose()?;
        let info = user
            .additional_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt64Array::from(vec![id])),
            Arc::new(StringArray::from(vec![user.name.as_deref()])),
            Arc::new(Float64Array::from(vec![user.age])),
            Arc::new(StringArray::from(vec![address])),
            Arc::new(StringArray::from(vec![info])),
            Arc::new(TimestampMicrosecondArray::from(vec![Utc::now().timestamp_micros()])),
        ];
        let batch = RecordBatch::try_new(self.schema.clone(), columns)?;
        self.write_file(&format!("user-{:012}.parquet", id), &[batch])?;

        debug!(id, "stored user");
        Ok(RecordId(id))
    }

    fn all_ages(&self) -> Result<Vec<Option<f64>>, StoreError> {
        let mut ages = Vec::new();
        self.scan(|batch| {
            ages.extend(column::<Float64Array>(batch, "age")?.iter());
            Ok(())
        })?;
        Ok(ages)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for p in self.data_files()? {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&p)?)?;
            total += builder.metadata().file_metadata().num_rows().max(0) as u64;
        }
        Ok(total)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let files = self.data_files()?;
        for p in &files {
            fs::remove_file(p)?;
        }
        info!(files = files.len(), "cleared parquet store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn user(first: &str, age: Option<f64>) -> UserRecord {
        let mut address = Record::new();
        address.set_path("city", Value::Str("Pune".into()));
        let mut info = Record::new();
        info.set_path("gender", Value::Str("male".into()));
        info.set_path("meta.score", Value::Float(1.5));
        UserRecord {
            name: Some(first.to_string()),
            age,
            address: Some(Value::Object(address)),
            additional_info: Some(info),
        }
    }

    #[test]
    fn test_insert_and_read_back() -> Result<()> {
        let tmp = tempdir()?;
        let store = ParquetStore::open(tmp.path())?;

        let a = store.insert(&user("Ada", Some(36.0)))?;
        let b = store.insert(&UserRecord {
            name: Some("Bo".into()),
            age: None,
            address: None,
            additional_info: None,
        })?;
        assert_eq!(a, RecordId(1));
        assert_eq!(b, RecordId(2));

        assert_eq!(store.count()?, 2);
        assert_eq!(store.all_ages()?, vec![Some(36.0), None]);

        let rows = store.rows()?;
        assert_eq!(rows[0].1, user("Ada", Some(36.0)));
        assert_eq!(rows[1].1.address, None);
        assert_eq!(rows[1].1.additional_info, None);
        Ok(())
    }

    #[test]
    fn test_ids_continue_after_reopen() -> Result<()> {
        let tmp = tempdir()?;
        {
            let store = ParquetStore::open(tmp.path())?;
            store.insert(&user("a", Some(1.0)))?;
            store.insert(&user("b", Some(2.0)))?;
        }
        let store = ParquetStore::open(tmp.path())?;
        assert_eq!(store.count()?, 2);
        assert_eq!(store.insert(&user("c", Some(3.0)))?, RecordId(3));
        Ok(())
    }

    #[test]
    fn test_compact_keeps_rows() -> Result<()> {
        let tmp = tempdir()?;
        let store = ParquetStore::open(tmp.path())?;
        for (i, age) in [10.0, 25.0, 45.0].into_iter().enumerate() {
            store.insert(&user(&format!("u{}", i), Some(age)))?;
        }

        assert_eq!(store.compact()?, 3);
        assert_eq!(store.data_files()?.len(), 1);
        assert_eq!(store.count()?, 3);

        let mut ages = store.all_ages()?;
        ages.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ages, vec![Some(10.0), Some(25.0), Some(45.0)]);

        // ids keep counting past the consolidated file
        let reopened = ParquetStore::open(tmp.path())?;
        assert_eq!(reopened.insert(&user("d", Some(70.0)))?, RecordId(4));
        Ok(())
    }

    #[test]
    fn test_dir_with_glob_metacharacters() -> Result<()> {
        let tmp = tempdir()?;
        let dir = tmp.path().join("users[1]*?");
        let store = ParquetStore::open(&dir)?;
        store.insert(&user("a", Some(30.0)))?;
        store.insert(&user("b", Some(50.0)))?;
        assert_eq!(store.data_files()?.len(), 2);
        assert_eq!(store.count()?, 2);

        let reopened = ParquetStore::open(&dir)?;
        assert_eq!(reopened.insert(&user("c", None))?, RecordId(3));
        Ok(())
    }

    #[test]
    fn test_clear_removes_everything() -> Result<()> {
        let tmp = tempdir()?;
        let store = ParquetStore::open(tmp.path())?;
        store.insert(&user("a", Some(1.0)))?;
        store.clear()?;
        assert_eq!(store.count()?, 0);
        assert!(store.all_ages()?.is_empty());
        Ok(())
    }
}
