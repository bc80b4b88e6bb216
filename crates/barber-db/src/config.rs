//! # Ledger Configuration
//!
//! Runtime settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`BARBER_*`, `RUST_LOG`)
//! 2. Defaults (this file)
//!
//! Read-only after initialization.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use barber_core::payroll::clamp_payout_percent;
use barber_core::DEFAULT_PAYOUT_PERCENT;

use crate::pool::DbConfig;

/// Log filter used when neither `RUST_LOG` nor `BARBER_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info,barber=debug,sqlx=warn";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerConfig {
    /// SQLite file. Default: `./barber.db`
    pub database_path: PathBuf,

    /// Payout percent offered when the operator does not pick one.
    /// Default: 100
    pub default_payout_percent: u32,

    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from("./barber.db"),
            default_payout_percent: DEFAULT_PAYOUT_PERCENT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Builds the configuration from environment variables and defaults.
    ///
    /// ## Environment Variables
    /// - `BARBER_DB_PATH`: database file
    /// - `BARBER_DEFAULT_PAYOUT_PERCENT`: integer, clamped to 1..=100
    /// - `BARBER_LOG`: log filter
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = LedgerConfig::default();

        if let Some(path) = lookup("BARBER_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("BARBER_DEFAULT_PAYOUT_PERCENT") {
            match raw.trim().parse::<i64>() {
                Ok(percent) => config.default_payout_percent = clamp_payout_percent(percent),
                Err(_) => warn!(value = %raw, "Ignoring invalid BARBER_DEFAULT_PAYOUT_PERCENT"),
            }
        }

        if let Some(filter) = lookup("BARBER_LOG").filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        config
    }

    /// Pool configuration for the configured file.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over `fallback_filter`.
pub fn init_tracing(fallback_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second init (tests, embedding shells) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
