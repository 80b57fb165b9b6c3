//! Load user records from CSV into a store and summarise their ages.
//!
//! `parse` turns a CSV file into generic nested records, `import` shapes them
//! into users and persists them batch by batch, `store` holds the backends.

pub mod config;
pub mod import;
pub mod parse;
pub mod store;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt().with_env_filter(env).with_target(false).try_init();
}
