//! One full report run: load, derive, summarize, aggregate, export.

use crate::config::ReportConfig;
use crate::error::ReportResult;
use crate::features::{derive_features, SALES};
use crate::loader;
use crate::output;
use crate::reports::{self, CATEGORY_PERFORMANCE};
use crate::types::{SalesSummary, Table};
use tracing::{debug, info};

/// Sheet holding the full enriched table.
pub const MAIN_SHEET: &str = "Main Data";

#[derive(Debug)]
pub struct RunOutcome {
    pub table: Table,
    pub summary: SalesSummary,
    pub views: Vec<(&'static str, Table)>,
}

pub fn run(config: &ReportConfig) -> ReportResult<RunOutcome> {
    let (raw, report) = loader::load_table(&config.input_path)?;
    for (name, dtype) in &report.column_types {
        debug!(column = %name, %dtype, "inferred column type");
    }
    output::print_overview(&raw, config.head_rows);

    let table = derive_features(raw, &config.date_format)?;

    let summary = reports::generate_summary(&table)?;
    output::print_summary(&summary);

    let views = reports::build_views(&table)?;
    if let Some((_, category)) = views
        .iter()
        .find(|(name, _)| *name == CATEGORY_PERFORMANCE.name)
    {
        let ranked = reports::sort_descending(category, SALES)?;
        println!("\nCategory Performance:");
        output::preview_table(&ranked, ranked.rows.len());
    }

    let mut sheets: Vec<(&str, &Table)> = vec![(MAIN_SHEET, &table)];
    sheets.extend(views.iter().map(|(name, view)| (*name, view)));
    output::write_workbook(&config.output_path, &sheets)?;
    println!(
        "All analysis data saved to '{}'",
        config.output_path.display()
    );
    info!(sheets = sheets.len(), "report complete");

    Ok(RunOutcome {
        table,
        summary,
        views,
    })
}
