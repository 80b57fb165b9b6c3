use anyhow::{Context, Result};
use csvload::{
    config::Config,
    import::Importer,
    init_logging,
    store::{ParquetStore, UserStore},
};
use serde_json::json;
use std::{convert::Infallible, path::PathBuf, sync::Arc, time::Instant};
use tracing::{error, info};
use warp::{http::StatusCode, reject::Rejection, reply::Reply, Filter};

struct AppState {
    importer: Importer,
    csv_path: PathBuf,
}

impl AppState {
    fn store(&self) -> Arc<dyn UserStore> {
        Arc::clone(self.importer.store())
    }
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_reply(body: serde_json::Value, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn error_reply(err: impl std::fmt::Display) -> warp::reply::WithStatus<warp::reply::Json> {
    json_reply(json!({ "error": err.to_string() }), StatusCode::INTERNAL_SERVER_ERROR)
}

async fn total_users(store: Arc<dyn UserStore>) -> Result<u64> {
    let count = tokio::task::spawn_blocking(move || store.count()).await??;
    Ok(count)
}

async fn index() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&json!({
        "message": "CSV-to-JSON API ready",
        "endpoints": {
            "/upload": "Process CSV file and store in database",
            "/stats": "Get database statistics",
            "/clear": "Clear all users from database"
        }
    })))
}

async fn upload(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let start = Instant::now();
    info!(csv = %state.csv_path.display(), "starting CSV processing");

    let report = match state.importer.import_file(&state.csv_path).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "error processing CSV");
            return Ok(error_reply(e));
        }
    };

    match total_users(state.store()).await {
        Ok(total) => {
            info!(
                inserted = report.inserted_count,
                total,
                elapsed = ?start.elapsed(),
                "CSV processed"
            );
            Ok(json_reply(
                json!({
                    "message": "CSV processed successfully",
                    "distribution": report.distribution,
                    "totalUsers": total,
                    "insertedCount": report.inserted_count,
                }),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            error!(error = %e, "error counting users");
            Ok(error_reply(e))
        }
    }
}

async fn stats(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    match total_users(state.store()).await {
        Ok(total) => Ok(json_reply(
            json!({
                "totalUsers": total,
                "message": "Database statistics retrieved successfully"
            }),
            StatusCode::OK,
        )),
        Err(e) => {
            error!(error = %e, "error getting stats");
            Ok(error_reply(e))
        }
    }
}

async fn clear(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let store = state.store();
    match tokio::task::spawn_blocking(move || store.clear()).await {
        Ok(Ok(())) => Ok(json_reply(
            json!({ "message": "All users cleared from database" }),
            StatusCode::OK,
        )),
        Ok(Err(e)) => {
            error!(error = %e, "error clearing users");
            Ok(error_reply(e))
        }
        Err(e) => {
            error!(error = %e, "clear task failed");
            Ok(error_reply(e))
        }
    }
}

fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index = warp::path::end().and(warp::get()).and_then(index);
    let upload = warp::path("upload")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(upload);
    let stats = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(stats);
    let clear = warp::path("clear")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(clear);

    index.or(upload).or(stats).or(clear)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    init_logging(&cfg.log_level);

    let store = ParquetStore::open(&cfg.store_dir)
        .with_context(|| format!("opening store at {}", cfg.store_dir.display()))?;
    let state = Arc::new(AppState {
        importer: Importer::new(Arc::new(store)).with_batch_size(cfg.batch_size),
        csv_path: cfg.csv_path.clone(),
    });

    info!("Server running on port {}", cfg.port);
    info!("Visit http://localhost:{} for API documentation", cfg.port);
    info!("CSV file path: {}", cfg.csv_path.display());

    warp::serve(routes(state)).run(([0, 0, 0, 0], cfg.port)).await;
    Ok(())
}
