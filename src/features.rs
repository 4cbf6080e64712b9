//! Derived columns added to the loaded table.
//!
//! The pass consumes the raw table and returns it enriched: date columns are
//! parsed in place, `Profit` is coerced to numbers, `Returns` is normalized,
//! and the calendar, shipping, margin and bucket columns are appended.

use crate::error::{ReportError, ReportResult};
use crate::types::{SalesBucket, Table, Value};
use crate::util::{days_diff, parse_date, parse_f64};
use chrono::{Datelike, NaiveDate};
use tracing::info;

pub const ORDER_DATE: &str = "Order Date";
pub const SHIP_DATE: &str = "Ship Date";
pub const RETURNS: &str = "Returns";
pub const PROFIT: &str = "Profit";
pub const SALES: &str = "Sales";

pub const ORDER_YEAR: &str = "Order Year";
pub const ORDER_MONTH: &str = "Order Month";
pub const ORDER_QUARTER: &str = "Order Quarter";
pub const ORDER_DAY: &str = "Order Day";
pub const ORDER_WEEKDAY: &str = "Order Weekday";
pub const ORDER_MONTH_NAME: &str = "Order Month Name";
pub const SHIPPING_DAYS: &str = "Shipping Days";
pub const RETURN_FLAG: &str = "Return Flag";
pub const PROFIT_MARGIN: &str = "Profit Margin";
pub const SALES_CATEGORY: &str = "Sales Category";

const NOT_RETURNED: &str = "No";
const RETURNS_MISSING_MARKER: &str = "#N/A";

pub fn derive_features(mut table: Table, date_format: &str) -> ReportResult<Table> {
    let order_idx = table.column_index(ORDER_DATE)?;
    let ship_idx = table.column_index(SHIP_DATE)?;
    let returns_idx = table.column_index(RETURNS)?;
    let profit_idx = table.column_index(PROFIT)?;
    let sales_idx = table.column_index(SALES)?;

    for (row_no, row) in table.rows.iter_mut().enumerate() {
        row[order_idx] = parse_date_cell(&row[order_idx], row_no, ORDER_DATE, date_format)?;
        row[ship_idx] = parse_date_cell(&row[ship_idx], row_no, SHIP_DATE, date_format)?;
        row[returns_idx] = normalize_returns(&row[returns_idx]);
        row[profit_idx] = coerce_numeric(&row[profit_idx]);
    }

    let n = table.rows.len();
    let mut year = Vec::with_capacity(n);
    let mut month = Vec::with_capacity(n);
    let mut quarter = Vec::with_capacity(n);
    let mut day = Vec::with_capacity(n);
    let mut weekday = Vec::with_capacity(n);
    let mut month_name = Vec::with_capacity(n);
    let mut shipping = Vec::with_capacity(n);
    let mut flag = Vec::with_capacity(n);
    let mut margin = Vec::with_capacity(n);
    let mut bucket = Vec::with_capacity(n);

    for row in &table.rows {
        let order = row[order_idx].as_date();
        let ship = row[ship_idx].as_date();
        let cal = order.map(CalendarFeatures::from_date);

        year.push(cal.as_ref().map_or(Value::Empty, |c| Value::Int(c.year)));
        month.push(cal.as_ref().map_or(Value::Empty, |c| Value::Int(c.month)));
        quarter.push(cal.as_ref().map_or(Value::Empty, |c| Value::Int(c.quarter)));
        day.push(cal.as_ref().map_or(Value::Empty, |c| Value::Int(c.day)));
        weekday.push(cal.as_ref().map_or(Value::Empty, |c| Value::Text(c.weekday.clone())));
        month_name.push(cal.as_ref().map_or(Value::Empty, |c| Value::Text(c.month_name.clone())));

        shipping.push(match (order, ship) {
            (Some(o), Some(s)) => Value::Int(shipping_days(o, s)),
            _ => Value::Empty,
        });

        flag.push(Value::Text(return_flag(&row[returns_idx]).to_string()));

        let sales = row[sales_idx].as_f64();
        margin.push(profit_margin(row[profit_idx].as_f64(), sales));
        bucket.push(match SalesBucket::classify(sales).label() {
            Some(label) => Value::Text(label.to_string()),
            None => Value::Empty,
        });
    }

    table.push_column(ORDER_YEAR, year);
    table.push_column(ORDER_MONTH, month);
    table.push_column(ORDER_QUARTER, quarter);
    table.push_column(ORDER_DAY, day);
    table.push_column(ORDER_WEEKDAY, weekday);
    table.push_column(ORDER_MONTH_NAME, month_name);
    table.push_column(SHIPPING_DAYS, shipping);
    table.push_column(RETURN_FLAG, flag);
    table.push_column(PROFIT_MARGIN, margin);
    table.push_column(SALES_CATEGORY, bucket);

    info!(rows = n, columns = table.columns.len(), "derived features");
    Ok(table)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarFeatures {
    pub year: i64,
    pub month: i64,
    pub quarter: i64,
    pub day: i64,
    pub weekday: String,
    pub month_name: String,
}

impl CalendarFeatures {
    pub fn from_date(d: NaiveDate) -> Self {
        Self {
            year: d.year() as i64,
            month: d.month() as i64,
            quarter: ((d.month() - 1) / 3 + 1) as i64,
            day: d.day() as i64,
            weekday: d.format("%A").to_string(),
            month_name: d.format("%B").to_string(),
        }
    }
}

fn parse_date_cell(cell: &Value, row: usize, column: &str, format: &str) -> ReportResult<Value> {
    let text = match cell {
        Value::Empty => return Ok(Value::Empty),
        Value::Date(d) => return Ok(Value::Date(*d)),
        other => other.to_string(),
    };
    parse_date(&text, format)
        .map(Value::Date)
        .map_err(|_| ReportError::DateParse {
            row: row + 1,
            column: column.to_string(),
            value: text,
            format: format.to_string(),
        })
}

pub fn shipping_days(order: NaiveDate, ship: NaiveDate) -> i64 {
    days_diff(order, ship)
}

/// Missing values and the `#N/A` marker mean "not returned".
pub fn normalize_returns(cell: &Value) -> Value {
    match cell {
        Value::Empty => Value::Text(NOT_RETURNED.to_string()),
        Value::Text(s) if s == RETURNS_MISSING_MARKER => Value::Text(NOT_RETURNED.to_string()),
        other => other.clone(),
    }
}

/// Anything other than the text "No" counts as a return, numeric codes included.
pub fn return_flag(normalized_returns: &Value) -> &'static str {
    match normalized_returns {
        Value::Text(s) if s == NOT_RETURNED => "No",
        _ => "Yes",
    }
}

/// Numbers pass through; anything unparseable becomes missing.
pub fn coerce_numeric(cell: &Value) -> Value {
    match cell {
        Value::Int(_) | Value::Float(_) | Value::Empty => cell.clone(),
        Value::Text(s) => parse_f64(s).map(Value::Float).unwrap_or(Value::Empty),
        _ => Value::Empty,
    }
}

/// `profit / sales * 100`, `Undefined` when sales is zero.
///
/// The undefined value keeps the IEEE quotient: `inf`, `-inf`, or NaN for 0/0.
pub fn profit_margin(profit: Option<f64>, sales: Option<f64>) -> Value {
    match (profit, sales) {
        (Some(p), Some(s)) if s == 0.0 => Value::Undefined(p / s * 100.0),
        (Some(p), Some(s)) => Value::Float(p / s * 100.0),
        _ => Value::Empty,
    }
}
