//! # Daily Report
//!
//! Generates the financial summary of one day and prints it as JSON.
//!
//! ## Usage
//! ```bash
//! # Today's report
//! cargo run -p barber-db --bin daily-report
//!
//! # A past day, replacing a report generated earlier
//! cargo run -p barber-db --bin daily-report -- 2024-05-02 --force
//! ```
//!
//! The database comes from `BARBER_DB_PATH` (see `LedgerConfig`) unless
//! `--db` is given.

use std::env;

use barber_core::day::{parse_day, today};
use barber_db::{init_tracing, Database, DbConfig, LedgerConfig, ReportError};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LedgerConfig::from_env();
    init_tracing(&config.log_filter);

    let args: Vec<String> = env::args().collect();

    let mut day = today();
    let mut force = false;
    let mut db_config = config.db_config();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--force" | "-f" => force = true,
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_config = DbConfig::new(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Barber Ledger Daily Report");
                println!();
                println!("Usage: daily-report [DAY] [OPTIONS]");
                println!();
                println!("Arguments:");
                println!("  DAY                 YYYY-MM-DD or a timestamp (default: today)");
                println!();
                println!("Options:");
                println!("  -f, --force         Replace an existing report for the day");
                println!("  -d, --db <PATH>     Database file path");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            raw => day = parse_day(raw)?,
        }
        i += 1;
    }

    let db = Database::new(db_config).await?;

    let report = match db.reports().generate_report(day, force).await {
        Ok(report) => report,
        Err(ReportError::AlreadyExists(day)) => {
            warn!(%day, "Report already generated, printing the stored one");
            match db.reports().get_by_day(day).await? {
                Some(report) => report,
                None => return Err(ReportError::AlreadyExists(day).into()),
            }
        }
        Err(err) => return Err(err.into()),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    db.close().await;
    Ok(())
}
