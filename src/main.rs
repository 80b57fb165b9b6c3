use anyhow::{Context, Result};
use csvload::{
    config::Config,
    import::Importer,
    init_logging,
    store::{ParquetStore, UserStore},
};
use std::{env, path::PathBuf, sync::Arc, time::Instant};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) config + logging ─────────────────────────────────────────
    let cfg = Config::from_env();
    init_logging(&cfg.log_level);

    let csv_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.csv_path.clone());
    info!(csv = %csv_path.display(), store = %cfg.store_dir.display(), "startup");

    // ─── 2) open store ───────────────────────────────────────────────
    let store = ParquetStore::open(&cfg.store_dir)
        .with_context(|| format!("opening store at {}", cfg.store_dir.display()))?;
    let store = Arc::new(store);

    // ─── 3) import ───────────────────────────────────────────────────
    let start = Instant::now();
    let importer = Importer::new(store.clone()).with_batch_size(cfg.batch_size);
    let report = importer
        .import_file(&csv_path)
        .await
        .with_context(|| format!("importing {}", csv_path.display()))?;
    info!(
        inserted = report.inserted_count,
        skipped = report.skipped,
        elapsed = ?start.elapsed(),
        "import complete"
    );

    // ─── 4) fold the per-row files together ──────────────────────────
    let merged = store.compact().context("compacting store")?;
    info!(merged, total = store.count()?, "store compacted");

    println!("=== Age-Group % Distribution ===");
    for (bucket, pct) in report.distribution.buckets() {
        println!("{:>6}: {}%", bucket, pct);
    }
    Ok(())
}
