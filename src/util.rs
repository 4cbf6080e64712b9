// Parsing, statistics and number formatting helpers.
//
// Cell-level parsing lives here so the loader and the feature pass agree on
// what counts as a number or a date.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Parse an integer cell. Surrounding whitespace is ignored.
pub fn parse_i64(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok()
}

/// Parse a floating-point cell. Accepts anything `f64::from_str` does,
/// including exponents and `inf`.
pub fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

pub fn parse_date(s: &str, format: &str) -> Result<NaiveDate, chrono::ParseError> {
    // Strict: the whole trimmed value must match `format` (the report uses
    // `%d-%m-%Y`). There is no fallback format; callers decide what a
    // mismatch means.
    NaiveDate::parse_from_str(s.trim(), format)
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    // `NaiveDate` subtraction yields a `Duration`; whole days only, and the
    // result is negative when `end` precedes `start`.
    (end - start).num_days()
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub fn std_dev(v: &[f64]) -> Option<f64> {
    if v.len() < 2 {
        return None;
    }
    let m = mean(v)?;
    let var = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (v.len() - 1) as f64;
    Some(var.sqrt())
}

/// Quantile with linear interpolation between closest ranks.
/// `sorted` must be ascending.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    // Fractional rank into the sorted data, then interpolate between the two
    // neighbouring values (same convention as a dataframe `describe()`).
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Fixed decimals with `en` thousands separators, e.g. `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return format!("{}", n);
    }
    let neg = n.is_sign_negative() && n != 0.0;
    // Format the magnitude first (`1234567.89`), then let `num-format` insert
    // separators into the integer part only.
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    // Values that round to zero print without a sign.
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    match n {
        Some(v) => format_number(v, decimals),
        None => "n/a".to_string(),
    }
}
