// src/config.rs
use std::{env, path::PathBuf, str::FromStr};
use tracing::warn;

use crate::import::BATCH_SIZE;

/// Process settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// CSV imported by the CLI default and by `GET /upload`.
    pub csv_path: PathBuf,
    /// Directory of the Parquet user store.
    pub store_dir: PathBuf,
    pub batch_size: usize,
    pub port: u16,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("./data/users.csv"),
            store_dir: PathBuf::from("./data/store"),
            batch_size: BATCH_SIZE,
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        // a missing .env file is normal
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let batch_size = parse_or("BATCH_SIZE", lookup("BATCH_SIZE"), defaults.batch_size);
        Self {
            csv_path: lookup("CSV_PATH").map(PathBuf::from).unwrap_or(defaults.csv_path),
            store_dir: lookup("STORE_DIR").map(PathBuf::from).unwrap_or(defaults.store_dir),
            batch_size: if batch_size == 0 {
                warn!("BATCH_SIZE must be at least 1; using {}", defaults.batch_size);
                defaults.batch_size
            } else {
                batch_size
            },
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}

fn parse_or<T: FromStr + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(s) => s.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %s, "unparseable setting; using {}", default);
            default
        }),
    }
}
