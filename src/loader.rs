use crate::error::{ReportError, ReportResult};
use crate::types::{ColumnType, Table, Value};
use crate::util::{parse_f64, parse_i64};
use csv::{ReaderBuilder, StringRecord};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Cell contents that load as missing, in addition to the empty string.
static NA_MARKERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
        "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
    ]
    .into_iter()
    .collect()
});

pub fn is_na_marker(s: &str) -> bool {
    s.is_empty() || NA_MARKERS.contains(s)
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub column_types: Vec<(String, ColumnType)>,
}

/// Load the CSV at `path` into a [`Table`].
pub fn load_table(path: &Path) -> ReportResult<(Table, LoadReport)> {
    let file = File::open(path)?;
    info!(path = %path.display(), "loading dataset");
    read_table(file)
}

/// Read CSV from any reader. Column types are inferred per column: integer if
/// every present cell is an integer, float if every present cell is a number,
/// text otherwise.
pub fn read_table<R: Read>(reader: R) -> ReportResult<(Table, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let width = columns.len();

    // Short rows are padded with missing cells below; a row wider than the
    // header has nowhere to put its extra fields and is rejected.
    let mut raw: Vec<StringRecord> = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() > width {
            return Err(ReportError::ExtraFields {
                row: line + 1,
                expected: width,
                found: record.len(),
            });
        }
        raw.push(record);
    }

    let kinds: Vec<ColumnType> = (0..width)
        .map(|idx| infer_column(raw.iter().map(|r| r.get(idx).unwrap_or(""))))
        .collect();

    let rows: Vec<Vec<Value>> = raw
        .iter()
        .map(|record| {
            (0..width)
                .map(|idx| to_value(record.get(idx).unwrap_or(""), kinds[idx]))
                .collect()
        })
        .collect();

    let column_types: Vec<(String, ColumnType)> =
        columns.iter().cloned().zip(kinds.iter().copied()).collect();

    let report = LoadReport {
        total_rows: rows.len(),
        column_types,
    };
    info!(rows = report.total_rows, columns = width, "dataset loaded");
    Ok((Table { columns, rows }, report))
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut kind = ColumnType::Int;
    for cell in cells.filter(|c| !is_na_marker(c.trim())) {
        if kind == ColumnType::Int && parse_i64(cell).is_none() {
            kind = ColumnType::Float;
        }
        if kind == ColumnType::Float && parse_f64(cell).is_none() {
            return ColumnType::Text;
        }
    }
    kind
}

fn to_value(cell: &str, kind: ColumnType) -> Value {
    if is_na_marker(cell.trim()) {
        return Value::Empty;
    }
    match kind {
        ColumnType::Int => parse_i64(cell).map(Value::Int).unwrap_or(Value::Empty),
        ColumnType::Float => parse_f64(cell).map(Value::Float).unwrap_or(Value::Empty),
        _ => Value::Text(cell.to_string()),
    }
}
