// Entry point for the sales performance report.
//
// A single run loads the sales CSV, prints exploratory diagnostics and the
// headline metrics, then writes the enriched table and every aggregation view
// to one workbook. Paths are fixed in `ReportConfig::default()`.
mod config;
mod error;
mod features;
mod loader;
mod output;
mod pipeline;
mod reports;
mod types;
mod util;

use config::ReportConfig;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let config = ReportConfig::default();
    match pipeline::run(&config) {
        Ok(outcome) => info!(
            rows = outcome.table.rows.len(),
            views = outcome.views.len(),
            total_sales = outcome.summary.total_sales,
            "done"
        ),
        Err(e) => {
            error!(error = %e, "report run failed");
            eprintln!("Failed to generate report: {}", e);
            process::exit(1);
        }
    }
}
