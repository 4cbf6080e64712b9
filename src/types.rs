use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use tabled::Tabled;

use crate::error::{ReportError, ReportResult};

/// A single cell of the in-memory table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    /// Result of an arithmetic operation with no defined value (division by
    /// zero). Holds the raw IEEE quotient so the sign survives export.
    Undefined(f64),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Empty => 0,
            Value::Undefined(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::Text(_) => 4,
        }
    }

    /// Total order used for grouping and distinct counting.
    ///
    /// Numbers compare numerically across `Int`/`Float`; different kinds order
    /// by kind.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (a, b) if a.rank() == 2 && b.rank() == 2 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "NaN"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Undefined(x) if x.is_nan() => write!(f, "NaN"),
            Value::Undefined(x) => write!(f, "{}", x),
        }
    }
}

/// Inferred storage type of a column, reported in the dataset info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Date,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "int64",
            ColumnType::Float => "float64",
            ColumnType::Date => "datetime64",
            ColumnType::Text => "object",
        };
        f.write_str(name)
    }
}

/// Rows x named columns. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> ReportResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ReportError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn column_by_name(&self, name: &str) -> ReportResult<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.column(idx).collect())
    }

    /// Append a column; `values` must hold one cell per row.
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(name.to_string());
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn non_null_count(&self, idx: usize) -> usize {
        self.column(idx).filter(|v| !v.is_missing()).count()
    }

    pub fn column_type(&self, idx: usize) -> ColumnType {
        let mut kind: Option<ColumnType> = None;
        for v in self.column(idx) {
            let this = match v {
                Value::Empty => continue,
                Value::Int(_) => ColumnType::Int,
                Value::Float(_) | Value::Undefined(_) => ColumnType::Float,
                Value::Date(_) => ColumnType::Date,
                Value::Text(_) => return ColumnType::Text,
            };
            kind = Some(match (kind, this) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Int), ColumnType::Float)
                | (Some(ColumnType::Float), ColumnType::Int) => ColumnType::Float,
                _ => return ColumnType::Text,
            });
        }
        // An all-missing column is numeric NaN, as in a dataframe.
        kind.unwrap_or(ColumnType::Float)
    }
}

/// Sales-size bucket over the bounds {0, 100, 500, 1000}, right-inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesBucket {
    /// Sales of zero, negative, or missing fall outside every range.
    Unclassified,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl SalesBucket {
    pub fn classify(sales: Option<f64>) -> SalesBucket {
        match sales {
            Some(s) if s > 0.0 && s <= 100.0 => SalesBucket::Low,
            Some(s) if s > 100.0 && s <= 500.0 => SalesBucket::Medium,
            Some(s) if s > 500.0 && s <= 1000.0 => SalesBucket::High,
            Some(s) if s > 1000.0 => SalesBucket::VeryHigh,
            _ => SalesBucket::Unclassified,
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            SalesBucket::Unclassified => None,
            SalesBucket::Low => Some("Low"),
            SalesBucket::Medium => Some("Medium"),
            SalesBucket::High => Some("High"),
            SalesBucket::VeryHigh => Some("Very High"),
        }
    }
}

#[derive(Debug, Tabled, Clone)]
pub struct ColumnInfoRow {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "Non-Null Count")]
    pub non_null: usize,
    #[tabled(rename = "Missing")]
    pub missing: usize,
    #[tabled(rename = "Dtype")]
    pub dtype: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct DescribeRow {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "count")]
    pub count: usize,
    #[tabled(rename = "mean")]
    pub mean: String,
    #[tabled(rename = "std")]
    pub std: String,
    #[tabled(rename = "min")]
    pub min: String,
    #[tabled(rename = "25%")]
    pub q25: String,
    #[tabled(rename = "50%")]
    pub q50: String,
    #[tabled(rename = "75%")]
    pub q75: String,
    #[tabled(rename = "max")]
    pub max: String,
}

/// The six headline scalars of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_quantity: f64,
    pub avg_profit_margin: Option<f64>,
    pub avg_shipping_days: Option<f64>,
    pub return_rate: Option<f64>,
}
