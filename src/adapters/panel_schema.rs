//! Column layout of the monthly panel, shared by the file and store adapters.
//!
//! Column names are matched after [`normalize`], so `ChangeRate`,
//! `change_rate` and `CHANGE RATE` all refer to the same field.

use crate::domain::error::KrxQuantError;
use crate::domain::panel::PanelRow;
use chrono::NaiveDate;

pub const TABLE: &str = "stock_monthly_data";

/// Columns every panel source must provide.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Date",
    "Ticker",
    "Name",
    "Close",
    "ChangeRate",
    "PER",
    "BPS",
    "PBR",
    "EPS",
    "DIV",
];

/// Read when present, otherwise left empty.
pub const OPTIONAL_COLUMNS: [&str; 9] = [
    "Open",
    "High",
    "Low",
    "Volume",
    "DPS",
    "MarketCap",
    "SharesOutstanding",
    "DebtRatio",
    "DividendYield",
];

/// Store column order.
pub const ALL_COLUMNS: [&str; 19] = [
    "Date",
    "Ticker",
    "Name",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "ChangeRate",
    "PER",
    "BPS",
    "PBR",
    "EPS",
    "DPS",
    "DIV",
    "MarketCap",
    "SharesOutstanding",
    "DebtRatio",
    "DividendYield",
];

pub fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Required columns absent from `present`, in canonical spelling.
pub fn missing_required<'a>(present: impl IntoIterator<Item = &'a str>) -> Vec<&'static str> {
    let present: Vec<String> = present.into_iter().map(normalize).collect();
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !present.contains(&normalize(col)))
        .collect()
}

pub fn require_columns<'a>(
    source: &str,
    present: impl IntoIterator<Item = &'a str>,
) -> Result<(), KrxQuantError> {
    let missing = missing_required(present);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(KrxQuantError::malformed(format!(
            "{source} is missing required columns: {}",
            missing.join(", ")
        )))
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and `YYYYMMDD`.
pub fn parse_date(value: &str) -> Result<NaiveDate, KrxQuantError> {
    let v = value.trim();
    let day = v.get(..10).unwrap_or(v);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(v, "%Y%m%d"))
        .map_err(|_| KrxQuantError::malformed(format!("invalid date {v:?}")))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Empty, `nan` and non-finite cells are missing values.
pub fn parse_number(column: &str, value: &str) -> Result<Option<f64>, KrxQuantError> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    v.parse::<f64>()
        .map(|n| Some(n).filter(|n| n.is_finite()))
        .map_err(|_| KrxQuantError::malformed(format!("column {column}: {v:?} is not a number")))
}

/// Store `value` in the numeric field named by `column`. Unknown and
/// non-numeric columns are ignored.
pub fn set_numeric(row: &mut PanelRow, column: &str, value: Option<f64>) {
    let slot = match normalize(column).as_str() {
        "open" => &mut row.open,
        "high" => &mut row.high,
        "low" => &mut row.low,
        "close" => &mut row.close,
        "volume" => &mut row.volume,
        "changerate" => &mut row.change_rate,
        "per" => &mut row.per,
        "bps" => &mut row.bps,
        "pbr" => &mut row.pbr,
        "eps" => &mut row.eps,
        "dps" => &mut row.dps,
        "div" => &mut row.div,
        "marketcap" => &mut row.market_cap,
        "sharesoutstanding" => &mut row.shares_outstanding,
        "debtratio" => &mut row.debt_ratio,
        "dividendyield" => &mut row.dividend_yield,
        _ => return,
    };
    *slot = value;
}

/// The numeric field named by `column`, if it is one.
pub fn numeric(row: &PanelRow, column: &str) -> Option<f64> {
    match normalize(column).as_str() {
        "open" => row.open,
        "high" => row.high,
        "low" => row.low,
        "close" => row.close,
        "volume" => row.volume,
        "changerate" => row.change_rate,
        "per" => row.per,
        "bps" => row.bps,
        "pbr" => row.pbr,
        "eps" => row.eps,
        "dps" => row.dps,
        "div" => row.div,
        "marketcap" => row.market_cap,
        "sharesoutstanding" => row.shares_outstanding,
        "debtratio" => row.debt_ratio,
        "dividendyield" => row.dividend_yield,
        _ => None,
    }
}
