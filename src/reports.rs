use crate::error::ReportResult;
use crate::features::{PROFIT, PROFIT_MARGIN, RETURN_FLAG, SALES, SHIPPING_DAYS};
use crate::types::{ColumnInfoRow, DescribeRow, SalesSummary, Table, Value};
use crate::util::{format_number, mean, quantile, std_dev};
use std::cmp::Ordering;
use tracing::debug;

/// How a grouped bucket of cells collapses into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    /// Present (non-missing) values.
    Count,
    /// Distinct present values.
    CountDistinct,
}

impl Reducer {
    pub fn apply(self, cells: &[&Value]) -> Value {
        match self {
            Reducer::Sum => sum(cells),
            Reducer::Mean => {
                let nums: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();
                mean(&nums).map(Value::Float).unwrap_or(Value::Empty)
            }
            Reducer::Count => Value::Int(cells.iter().filter(|v| !v.is_missing()).count() as i64),
            Reducer::CountDistinct => {
                let mut present: Vec<&Value> =
                    cells.iter().copied().filter(|v| !v.is_missing()).collect();
                present.sort_by(|a, b| a.total_cmp(b));
                present.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
                Value::Int(present.len() as i64)
            }
        }
    }
}

// Integer columns stay integer unless the total leaves the i64 range; an
// undefined cell makes the whole sum undefined, carrying its IEEE value.
fn sum(cells: &[&Value]) -> Value {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total: f64 = 0.0;
    let mut all_int = true;
    let mut undefined = false;
    for v in cells {
        match v {
            Value::Int(i) => {
                int_total = int_total.and_then(|t| t.checked_add(*i));
                float_total += *i as f64;
            }
            Value::Float(f) => {
                all_int = false;
                float_total += f;
            }
            Value::Undefined(x) => {
                undefined = true;
                float_total += x;
            }
            _ => {}
        }
    }
    match (undefined, all_int, int_total) {
        (true, _, _) => Value::Undefined(float_total),
        (false, true, Some(total)) => Value::Int(total),
        _ => Value::Float(float_total),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reduction {
    pub column: &'static str,
    pub reducer: Reducer,
    /// Output column name; defaults to `column`.
    pub rename: Option<&'static str>,
}

impl Reduction {
    const fn new(column: &'static str, reducer: Reducer) -> Self {
        Self {
            column,
            reducer,
            rename: None,
        }
    }

    const fn renamed(column: &'static str, reducer: Reducer, rename: &'static str) -> Self {
        Self {
            column,
            reducer,
            rename: Some(rename),
        }
    }

    pub fn output_name(&self) -> &'static str {
        self.rename.unwrap_or(self.column)
    }
}

/// Keep only rows whose `column` holds the text `equals`.
#[derive(Debug, Clone, Copy)]
pub struct RowFilter {
    pub column: &'static str,
    pub equals: &'static str,
}

/// One grouped aggregation, exported as a sheet named `name`.
#[derive(Debug, Clone, Copy)]
pub struct ViewSpec {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub filter: Option<RowFilter>,
    pub reductions: &'static [Reduction],
}

use Reducer::{Count, CountDistinct, Mean, Sum};

pub const CATEGORY_PERFORMANCE: ViewSpec = ViewSpec {
    name: "Category Performance",
    keys: &["Category"],
    filter: None,
    reductions: &[
        Reduction::new(SALES, Sum),
        Reduction::new(PROFIT, Sum),
        Reduction::new("Quantity", Sum),
    ],
};

/// Every view in export order.
pub const VIEWS: [ViewSpec; 9] = [
    CATEGORY_PERFORMANCE,
    ViewSpec {
        name: "Monthly Sales",
        keys: &["Order Year", "Order Month", "Order Month Name"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(PROFIT, Sum),
            Reduction::new("Quantity", Sum),
        ],
    },
    ViewSpec {
        name: "Category Sales",
        keys: &["Category", "Sub-Category"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(PROFIT, Sum),
            Reduction::new("Quantity", Sum),
            Reduction::renamed("Row ID", Count, "Transaction Count"),
        ],
    },
    ViewSpec {
        name: "Regional Performance",
        keys: &["Region", "State"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(PROFIT, Sum),
            Reduction::renamed("Customer ID", CountDistinct, "Unique Customers"),
        ],
    },
    ViewSpec {
        name: "Customer Segmentation",
        keys: &["Segment", "Customer ID", "Customer Name"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(PROFIT, Sum),
            Reduction::renamed("Order ID", CountDistinct, "Order Count"),
        ],
    },
    ViewSpec {
        name: "Shipping Analysis",
        keys: &["Ship Mode", "Region"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(SHIPPING_DAYS, Mean),
            Reduction::renamed("Order ID", Count, "Shipment Count"),
        ],
    },
    ViewSpec {
        name: "Payment Analysis",
        keys: &["Payment Mode"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(PROFIT, Sum),
            Reduction::renamed("Order ID", Count, "Transaction Count"),
        ],
    },
    ViewSpec {
        name: "Product Performance",
        keys: &["Product ID", "Product Name", "Category", "Sub-Category"],
        filter: None,
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::new(PROFIT, Sum),
            Reduction::new("Quantity", Sum),
            Reduction::new(PROFIT_MARGIN, Mean),
        ],
    },
    ViewSpec {
        name: "Returns Analysis",
        keys: &["Category", "Sub-Category"],
        filter: Some(RowFilter {
            column: RETURN_FLAG,
            equals: "Yes",
        }),
        reductions: &[
            Reduction::new(SALES, Sum),
            Reduction::renamed("Order ID", Count, "Return Count"),
        ],
    },
];

/// Group `table` by the view's keys and reduce each group to one row.
///
/// Rows with a missing key are dropped. Groups come out in ascending key order.
pub fn aggregate(table: &Table, spec: &ViewSpec) -> ReportResult<Table> {
    let key_idx = spec
        .keys
        .iter()
        .map(|k| table.column_index(k))
        .collect::<ReportResult<Vec<_>>>()?;
    let value_idx = spec
        .reductions
        .iter()
        .map(|r| table.column_index(r.column))
        .collect::<ReportResult<Vec<_>>>()?;
    let filter = match spec.filter {
        Some(f) => Some((table.column_index(f.column)?, f.equals)),
        None => None,
    };

    let mut order: Vec<usize> = (0..table.rows.len())
        .filter(|&i| {
            let row = &table.rows[i];
            let keep = filter.map_or(true, |(idx, eq)| row[idx].as_text() == Some(eq));
            keep && key_idx.iter().all(|&k| !row[k].is_missing())
        })
        .collect();
    let compare_keys = |a: usize, b: usize| {
        key_idx
            .iter()
            .map(|&k| table.rows[a][k].total_cmp(&table.rows[b][k]))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    };
    order.sort_by(|&a, &b| compare_keys(a, b));

    let mut columns: Vec<String> = spec.keys.iter().map(|k| k.to_string()).collect();
    columns.extend(spec.reductions.iter().map(|r| r.output_name().to_string()));
    let mut out = Table::new(columns);

    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && compare_keys(order[start], order[end]) == Ordering::Equal {
            end += 1;
        }
        let group = &order[start..end];
        let first = &table.rows[group[0]];
        let mut row: Vec<Value> = key_idx.iter().map(|&k| first[k].clone()).collect();
        for (reduction, &col) in spec.reductions.iter().zip(&value_idx) {
            let cells: Vec<&Value> = group.iter().map(|&i| &table.rows[i][col]).collect();
            row.push(reduction.reducer.apply(&cells));
        }
        out.rows.push(row);
        start = end;
    }

    debug!(view = spec.name, groups = out.rows.len(), "aggregated view");
    Ok(out)
}

/// All nine views, paired with their sheet names, in export order.
pub fn build_views(table: &Table) -> ReportResult<Vec<(&'static str, Table)>> {
    VIEWS
        .iter()
        .map(|spec| aggregate(table, spec).map(|view| (spec.name, view)))
        .collect()
}

/// Copy of `table` ordered by `column`, largest first. Missing and
/// non-numeric values sort last.
pub fn sort_descending(table: &Table, column: &str) -> ReportResult<Table> {
    let idx = table.column_index(column)?;
    let mut sorted = table.clone();
    sorted.rows.sort_by(|a, b| match (a[idx].as_f64(), b[idx].as_f64()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(sorted)
}

fn numbers(table: &Table, column: &str) -> ReportResult<Vec<f64>> {
    Ok(table
        .column_by_name(column)?
        .into_iter()
        .filter_map(|v| v.as_f64())
        .collect())
}

pub fn generate_summary(table: &Table) -> ReportResult<SalesSummary> {
    let total_sales: f64 = numbers(table, SALES)?.iter().sum();
    let total_profit: f64 = numbers(table, PROFIT)?.iter().sum();
    let total_quantity: f64 = numbers(table, "Quantity")?.iter().sum();
    let avg_profit_margin = mean(&numbers(table, PROFIT_MARGIN)?);
    let avg_shipping_days = mean(&numbers(table, SHIPPING_DAYS)?);

    let returned = table
        .column_by_name(RETURN_FLAG)?
        .into_iter()
        .filter(|v| v.as_text() == Some("Yes"))
        .count();
    let return_rate = if table.is_empty() {
        None
    } else {
        Some(returned as f64 / table.rows.len() as f64 * 100.0)
    };

    Ok(SalesSummary {
        total_sales,
        total_profit,
        total_quantity,
        avg_profit_margin,
        avg_shipping_days,
        return_rate,
    })
}

pub fn column_info(table: &Table) -> Vec<ColumnInfoRow> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let non_null = table.non_null_count(idx);
            ColumnInfoRow {
                column: name.clone(),
                non_null,
                missing: table.rows.len() - non_null,
                dtype: table.column_type(idx).to_string(),
            }
        })
        .collect()
}

/// Count, mean, spread and quartiles of each fully numeric column.
pub fn describe(table: &Table) -> Vec<DescribeRow> {
    let stat = |v: Option<f64>| v.map_or_else(|| "NaN".to_string(), |x| format_number(x, 2));
    (0..table.columns.len())
        .filter(|&idx| table.column(idx).all(|v| v.is_missing() || v.as_f64().is_some()))
        .filter(|&idx| table.non_null_count(idx) > 0)
        .map(|idx| {
            let mut vals: Vec<f64> = table.column(idx).filter_map(|v| v.as_f64()).collect();
            vals.sort_by(|a, b| a.total_cmp(b));
            DescribeRow {
                column: table.columns[idx].clone(),
                count: vals.len(),
                mean: stat(mean(&vals)),
                std: stat(std_dev(&vals)),
                min: stat(vals.first().copied()),
                q25: stat(quantile(&vals, 0.25)),
                q50: stat(quantile(&vals, 0.5)),
                q75: stat(quantile(&vals, 0.75)),
                max: stat(vals.last().copied()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::features::derive_features;
    use crate::loader::read_table;

    const SAMPLE_CSV: &str = "\
Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,State,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Profit,Returns,Payment Mode
1,CA-1,01-03-2023,05-03-2023,Standard Class,C1,Ann Lee,Consumer,Texas,Central,P1,A,Chairs,Chair X,50,2,10,#N/A,Online
2,CA-1,01-03-2023,04-03-2023,Standard Class,C1,Ann Lee,Consumer,Texas,Central,P2,A,Tables,Table Y,150,1,-30,Yes,Online
3,CA-2,10-04-2023,12-04-2023,First Class,C2,Bo Chan,Corporate,Ohio,East,P3,B,Phones,Phone Z,0,3,5,,COD
4,CA-3,11-04-2023,15-04-2023,Standard Class,C3,Cy Diaz,Consumer,Texas,Central,P1,A,Chairs,Chair X,1200,5,300,Yes,Cards
";

    fn enriched() -> Table {
        let (table, _) = read_table(SAMPLE_CSV.as_bytes()).unwrap();
        derive_features(table, "%d-%m-%Y").unwrap()
    }

    fn view(name: &str) -> ViewSpec {
        *VIEWS.iter().find(|v| v.name == name).unwrap()
    }

    fn distinct_keys(table: &Table, spec: &ViewSpec) -> usize {
        let idx: Vec<usize> = spec.keys.iter().map(|k| table.column_index(k).unwrap()).collect();
        let mut keys: Vec<Vec<String>> = table
            .rows
            .iter()
            .filter(|r| match spec.filter {
                Some(f) => r[table.column_index(f.column).unwrap()].as_text() == Some(f.equals),
                None => true,
            })
            .map(|r| idx.iter().map(|&i| r[i].to_string()).collect())
            .collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }

    #[test]
    fn reducers_over_bucket() {
        let cells = [Value::Int(2), Value::Int(3), Value::Empty, Value::Int(2)];
        let refs: Vec<&Value> = cells.iter().collect();
        assert_eq!(Reducer::Sum.apply(&refs), Value::Int(7));
        assert_eq!(Reducer::Count.apply(&refs), Value::Int(3));
        assert_eq!(Reducer::CountDistinct.apply(&refs), Value::Int(2));
        match Reducer::Mean.apply(&refs) {
            Value::Float(m) => assert!((m - 7.0 / 3.0).abs() < 1e-9),
            other => panic!("unexpected mean {:?}", other),
        }

        let floats = [Value::Float(1.5), Value::Int(1), Value::Undefined(f64::INFINITY)];
        let refs: Vec<&Value> = floats.iter().collect();
        assert_eq!(Reducer::Mean.apply(&refs), Value::Float(1.25));
        assert_eq!(Reducer::Sum.apply(&refs[..2]), Value::Float(2.5));
        assert_eq!(Reducer::Sum.apply(&[]), Value::Int(0));
        assert_eq!(Reducer::Mean.apply(&[&Value::Empty]), Value::Empty);
        assert!(matches!(
            Reducer::Sum.apply(&refs),
            Value::Undefined(x) if x == f64::INFINITY
        ));
    }

    #[test]
    fn integer_sum_overflow_falls_back_to_float() {
        let cells = [Value::Int(i64::MAX), Value::Int(1)];
        let refs: Vec<&Value> = cells.iter().collect();
        match Reducer::Sum.apply(&refs) {
            Value::Float(f) => assert!((f - 9.223372036854776e18).abs() < 1e4),
            other => panic!("unexpected sum {:?}", other),
        }
    }

    #[test]
    fn category_performance_sums_per_category() {
        let t = enriched();
        let cat = aggregate(&t, &CATEGORY_PERFORMANCE).unwrap();
        assert_eq!(cat.columns, vec!["Category", "Sales", "Profit", "Quantity"]);
        assert_eq!(cat.rows.len(), 2);
        assert_eq!(cat.rows[0][0], Value::Text("A".into()));
        assert_eq!(cat.rows[0][1], Value::Int(1400));
        assert_eq!(cat.rows[0][3], Value::Int(8));
        assert_eq!(cat.rows[1][0], Value::Text("B".into()));
    }

    #[test]
    fn two_records_same_category_sum() {
        let csv_data = "Category,Sales,Profit,Quantity\nA,50,1,1\nA,150,2,1\n";
        let (t, _) = read_table(csv_data.as_bytes()).unwrap();
        let cat = aggregate(&t, &CATEGORY_PERFORMANCE).unwrap();
        assert_eq!(cat.rows.len(), 1);
        assert_eq!(cat.rows[0][1].as_f64(), Some(200.0));
    }

    #[test]
    fn category_totals_match_summary() {
        let t = enriched();
        let summary = generate_summary(&t).unwrap();
        let cat = aggregate(&t, &CATEGORY_PERFORMANCE).unwrap();
        let total: f64 = cat.column(1).filter_map(|v| v.as_f64()).sum();
        assert!((total - summary.total_sales).abs() < 1e-9);
    }

    #[test]
    fn row_counts_equal_distinct_keys() {
        let t = enriched();
        for spec in VIEWS.iter() {
            let out = aggregate(&t, spec).unwrap();
            assert_eq!(out.rows.len(), distinct_keys(&t, spec), "view {}", spec.name);
            assert_eq!(out.columns.len(), spec.keys.len() + spec.reductions.len());
        }
    }

    #[test]
    fn renamed_counts_and_distinct_counts() {
        let t = enriched();
        let regional = aggregate(&t, &view("Regional Performance")).unwrap();
        assert_eq!(regional.columns[4], "Unique Customers");
        // Central/Texas has customers C1 (twice) and C3.
        assert_eq!(regional.rows[0][0], Value::Text("Central".into()));
        assert_eq!(regional.rows[0][4], Value::Int(2));

        let customers = aggregate(&t, &view("Customer Segmentation")).unwrap();
        let c1 = customers
            .rows
            .iter()
            .find(|r| r[1] == Value::Text("C1".into()))
            .unwrap();
        assert_eq!(c1[5], Value::Int(1));

        let category_sales = aggregate(&t, &view("Category Sales")).unwrap();
        assert_eq!(category_sales.columns[5], "Transaction Count");
        let chairs = category_sales
            .rows
            .iter()
            .find(|r| r[1] == Value::Text("Chairs".into()))
            .unwrap();
        assert_eq!(chairs[5], Value::Int(2));
    }

    #[test]
    fn rows_with_missing_key_are_left_out() {
        let extra = "5,CA-4,12-04-2023,14-04-2023,First Class,C4,Di Eng,Consumer,Utah,,P4,B,Phones,Phone W,80,1,8,,COD\n";
        let csv_data = format!("{}{}", SAMPLE_CSV, extra);
        let (table, _) = read_table(csv_data.as_bytes()).unwrap();
        let t = derive_features(table, "%d-%m-%Y").unwrap();
        let regional = aggregate(&t, &view("Regional Performance")).unwrap();

        assert_eq!(regional.rows.len(), 2);
        assert!(regional.rows.iter().all(|r| r[1] != Value::Text("Utah".into())));
        let total: f64 = regional.column(2).filter_map(|v| v.as_f64()).sum();
        assert_eq!(total, 1400.0);

        // The row still counts where its keys are present.
        let payment = aggregate(&t, &view("Payment Analysis")).unwrap();
        let cod = payment
            .rows
            .iter()
            .find(|r| r[0] == Value::Text("COD".into()))
            .unwrap();
        assert_eq!(cod[3], Value::Int(2));
    }

    #[test]
    fn shipping_analysis_means_days() {
        let t = enriched();
        let shipping = aggregate(&t, &view("Shipping Analysis")).unwrap();
        // First Class/East, then Standard Class/Central.
        assert_eq!(shipping.rows[0][0], Value::Text("First Class".into()));
        assert_eq!(shipping.rows[1][3].as_f64(), Some((4.0 + 3.0 + 4.0) / 3.0));
        assert_eq!(shipping.rows[1][4], Value::Int(3));
    }

    #[test]
    fn returns_analysis_only_counts_returned_rows() {
        let t = enriched();
        let returns = aggregate(&t, &view("Returns Analysis")).unwrap();
        assert_eq!(returns.rows.len(), 2);
        assert!(returns.rows.iter().all(|r| r[3] == Value::Int(1)));
        assert_eq!(returns.columns[3], "Return Count");
    }

    #[test]
    fn product_margin_mean_skips_undefined() {
        let t = enriched();
        let products = aggregate(&t, &view("Product Performance")).unwrap();
        let phone = products
            .rows
            .iter()
            .find(|r| r[0] == Value::Text("P3".into()))
            .unwrap();
        assert_eq!(phone[7], Value::Empty);
        let chair = products
            .rows
            .iter()
            .find(|r| r[0] == Value::Text("P1".into()))
            .unwrap();
        assert_eq!(chair[7].as_f64(), Some(22.5));
    }

    #[test]
    fn monthly_sales_in_key_order() {
        let t = enriched();
        let monthly = aggregate(&t, &view("Monthly Sales")).unwrap();
        assert_eq!(monthly.rows.len(), 2);
        assert_eq!(monthly.rows[0][2], Value::Text("March".into()));
        assert_eq!(monthly.rows[1][2], Value::Text("April".into()));
        assert_eq!(monthly.rows[0][3], Value::Int(200));
    }

    #[test]
    fn missing_column_fails_view() {
        let csv_data = "Category,Sales\nA,1\n";
        let (t, _) = read_table(csv_data.as_bytes()).unwrap();
        let err = aggregate(&t, &CATEGORY_PERFORMANCE).unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn(c) if c == "Profit"));
    }

    #[test]
    fn sort_descending_by_sales() {
        let t = enriched();
        let cat = aggregate(&t, &CATEGORY_PERFORMANCE).unwrap();
        let mut flipped = cat.clone();
        flipped.rows.reverse();
        let sorted = sort_descending(&flipped, SALES).unwrap();
        assert_eq!(sorted.rows[0][0], Value::Text("A".into()));
        // Export order is untouched.
        assert_eq!(cat.rows[0][0], Value::Text("A".into()));
        assert_eq!(cat.rows[1][0], Value::Text("B".into()));
    }

    #[test]
    fn summary_scalars() {
        let t = enriched();
        let s = generate_summary(&t).unwrap();
        assert_eq!(s.total_sales, 1400.0);
        assert_eq!(s.total_profit, 285.0);
        assert_eq!(s.total_quantity, 11.0);
        assert_eq!(s.return_rate, Some(50.0));
        assert_eq!(s.avg_shipping_days, Some((4.0 + 3.0 + 2.0 + 4.0) / 4.0));
        // Margins 20, -20, 25; the zero-sales row is skipped.
        let m = s.avg_profit_margin.unwrap();
        assert!((m - 25.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_table_summary_has_no_averages() {
        let csv_data = "Order Date,Ship Date,Sales,Profit,Quantity,Returns\n";
        let (t, _) = read_table(csv_data.as_bytes()).unwrap();
        let t = derive_features(t, "%d-%m-%Y").unwrap();
        let s = generate_summary(&t).unwrap();
        assert_eq!(s.total_sales, 0.0);
        assert_eq!(s.return_rate, None);
        assert_eq!(s.avg_profit_margin, None);
    }

    #[test]
    fn info_and_describe() {
        let (t, _) = read_table(SAMPLE_CSV.as_bytes()).unwrap();
        let info = column_info(&t);
        let returns = info.iter().find(|r| r.column == "Returns").unwrap();
        assert_eq!(returns.missing, 2);
        assert_eq!(returns.non_null, 2);
        assert_eq!(returns.dtype, "object");

        let stats = describe(&t);
        let cols: Vec<&str> = stats.iter().map(|r| r.column.as_str()).collect();
        assert_eq!(cols, vec!["Row ID", "Sales", "Quantity", "Profit"]);
        let sales = &stats[1];
        assert_eq!(sales.count, 4);
        assert_eq!(sales.mean, "350.00");
        assert_eq!(sales.max, "1,200.00");
    }
}
