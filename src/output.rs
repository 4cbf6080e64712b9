use crate::error::ReportResult;
use crate::reports::{column_info, describe};
use crate::types::{SalesSummary, Table, Value};
use crate::util::{format_int, format_number, format_opt};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table as TextTable, Tabled};
use tracing::{debug, info};

/// Write every `(sheet name, table)` pair to one workbook at `path`.
///
/// The workbook is assembled in memory and saved once at the end.
pub fn write_workbook(path: &Path, sheets: &[(&str, &Table)]) -> ReportResult<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd");

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;
        write_sheet(worksheet, table, &header, &date)?;
        debug!(sheet = *name, rows = table.rows.len(), "sheet written");
    }

    workbook.save(path)?;
    info!(path = %path.display(), sheets = sheets.len(), "workbook saved");
    Ok(())
}

// Header row in bold at row 0, data from row 1. Column order is the table's;
// no index column is written.
fn write_sheet(
    worksheet: &mut Worksheet,
    table: &Table,
    header: &Format,
    date: &Format,
) -> ReportResult<()> {
    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, header)?;
    }
    for (idx, row) in table.rows.iter().enumerate() {
        let r = idx as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            let c = col as u16;
            match value {
                Value::Empty => {}
                Value::Int(i) => {
                    worksheet.write_number(r, c, *i as f64)?;
                }
                Value::Float(f) if f.is_finite() => {
                    worksheet.write_number(r, c, *f)?;
                }
                // Excel has no infinity or NaN: NaN stays blank and the
                // infinities are spelled out, sign included.
                Value::Float(f) | Value::Undefined(f) => {
                    if let Some(text) = non_finite_text(*f) {
                        worksheet.write_string(r, c, text)?;
                    }
                }
                Value::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Value::Date(d) => {
                    let dt = excel_date(*d)?;
                    worksheet.write_datetime_with_format(r, c, &dt, date)?;
                }
            }
        }
    }
    // Size columns to their contents once every cell is in place.
    worksheet.autofit();
    Ok(())
}

fn non_finite_text(f: f64) -> Option<&'static str> {
    if f.is_nan() {
        None
    } else if f > 0.0 {
        Some("inf")
    } else {
        Some("-inf")
    }
}

// Dates go out as real Excel serial dates so the sheet can sort and filter them.
fn excel_date(d: chrono::NaiveDate) -> ReportResult<ExcelDateTime> {
    use chrono::Datelike;
    Ok(ExcelDateTime::from_ymd(
        d.year() as u16,
        d.month() as u8,
        d.day() as u8,
    )?)
}

/// Render a [`Table`] as a markdown-style text table, at most `max_rows` rows.
pub fn render_table(table: &Table, max_rows: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.columns.iter().map(|c| c.to_string()));
    for row in table.rows.iter().take(max_rows) {
        builder.push_record(row.iter().map(render_cell));
    }
    let mut text = builder.build();
    text.with(Style::markdown());
    text.to_string()
}

fn render_cell(v: &Value) -> String {
    match v {
        Value::Float(f) => format!("{:.2}", f),
        other => other.to_string(),
    }
}

pub fn preview_table(table: &Table, max_rows: usize) {
    if table.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", render_table(table, max_rows));
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = TextTable::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Exploratory overview of the freshly loaded table.
pub fn print_overview(table: &Table, head_rows: usize) {
    let (rows, cols) = table.shape();
    println!("Dataset Shape: ({}, {})", rows, cols);
    println!("\nFirst {} rows:", head_rows);
    preview_table(&table.head(head_rows), head_rows);

    let info = column_info(table);
    println!("Dataset Info:");
    println!("RangeIndex: {} entries", format_int(rows));
    preview_table_rows(&info, info.len());

    println!("Missing Values:");
    for row in &info {
        println!("{:<24} {}", row.column, row.missing);
    }

    let stats = describe(table);
    println!("\nBasic Statistics:");
    preview_table_rows(&stats, stats.len());
}

pub fn print_summary(summary: &SalesSummary) {
    println!("Total Sales: ${}", format_number(summary.total_sales, 2));
    println!("Total Profit: ${}", format_number(summary.total_profit, 2));
    println!(
        "Total Quantity Sold: {}",
        format_number(summary.total_quantity, 0)
    );
    println!(
        "Average Profit Margin: {}%",
        format_opt(summary.avg_profit_margin, 2)
    );
    println!(
        "Average Shipping Days: {}",
        format_opt(summary.avg_shipping_days, 2)
    );
    println!("Return Rate: {}%", format_opt(summary.return_rate, 2));
}
