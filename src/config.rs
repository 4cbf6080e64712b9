use std::path::PathBuf;

/// Fixed settings for a single report run.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// `chrono` format for the `Order Date` and `Ship Date` columns.
    pub date_format: String,
    /// Rows shown in the console preview of the raw table.
    pub head_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("SuperStore_Sales_Dataset.csv"),
            output_path: PathBuf::from("SuperStore_Analysis.xlsx"),
            date_format: "%d-%m-%Y".to_string(),
            head_rows: 5,
        }
    }
}
