//! Performance analyzer: drawdown, CAGR, Sharpe and total return.
//!
//! Degenerate inputs come back as `UndefinedStatistic` rather than 0 or inf.

use super::backtest::BacktestResult;
use super::error::UndefinedStatistic;
use super::portfolio::{EquityPoint, RebalanceRecord, equity_curve};
use chrono::NaiveDate;

const DAYS_PER_YEAR: f64 = 365.25;
const MIN_VOLATILITY: f64 = 1e-12;

/// Largest peak-to-trough decline and the date it was reached.
///
/// The running peak starts at the first value. `None` for an empty series.
pub fn max_drawdown(points: &[EquityPoint]) -> Option<(f64, NaiveDate)> {
    let first = points.first()?;
    max_drawdown_from(first.value, points)
}

/// Same as [`max_drawdown`] with the running peak seeded at `peak`, so a
/// loss in the very first period counts against the starting capital.
pub fn max_drawdown_from(peak: f64, points: &[EquityPoint]) -> Option<(f64, NaiveDate)> {
    let first = points.first()?;
    let mut peak = peak;
    let mut max_dd = 0.0_f64;
    let mut max_date = first.date;

    for point in points {
        peak = peak.max(point.value);
        if peak > 0.0 {
            let dd = (peak - point.value) / peak;
            if dd > max_dd {
                max_dd = dd;
                max_date = point.date;
            }
        }
    }
    Some((max_dd, max_date))
}

/// `(final / initial)^(1 / years) - 1`.
pub fn cagr(initial: f64, final_value: f64, years: f64) -> Result<f64, UndefinedStatistic> {
    if years.is_nan() || years <= 0.0 {
        return Err(UndefinedStatistic::NonPositiveYears);
    }
    if initial.is_nan() || initial <= 0.0 {
        return Err(UndefinedStatistic::NonPositiveInitial);
    }
    Ok((final_value / initial).powf(1.0 / years) - 1.0)
}

/// Annualized Sharpe ratio over per-period returns.
///
/// Excess returns subtract `risk_free_annual / periods_per_year`; volatility
/// is the sample standard deviation.
pub fn sharpe(
    period_returns: &[f64],
    risk_free_annual: f64,
    periods_per_year: u32,
) -> Result<f64, UndefinedStatistic> {
    if period_returns.len() < 2 || periods_per_year == 0 {
        return Err(UndefinedStatistic::InsufficientReturns);
    }
    let ppy = f64::from(periods_per_year);
    let rf = risk_free_annual / ppy;
    let excess: Vec<f64> = period_returns.iter().map(|r| r - rf).collect();

    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;
    let variance = excess.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stdev = variance.sqrt();

    if stdev.is_nan() || stdev <= MIN_VOLATILITY {
        return Err(UndefinedStatistic::ZeroVolatility);
    }
    Ok(mean / stdev * ppy.sqrt())
}

pub fn total_return(initial: f64, final_value: f64) -> Result<f64, UndefinedStatistic> {
    if initial.is_nan() || initial <= 0.0 {
        return Err(UndefinedStatistic::NonPositiveInitial);
    }
    Ok(final_value / initial - 1.0)
}

/// Summary statistics, always derived from a record sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: Result<f64, UndefinedStatistic>,
    pub max_drawdown: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    pub cagr: Result<f64, UndefinedStatistic>,
    pub sharpe: Result<f64, UndefinedStatistic>,
    pub periods: usize,
    pub years: f64,
}

impl PerformanceSummary {
    pub fn compute(result: &BacktestResult, risk_free_rate: f64, periods_per_year: u32) -> Self {
        let mut summary = Self::from_records(
            &result.records,
            result.initial_capital,
            risk_free_rate,
            periods_per_year,
        );
        summary.final_value = result.final_value;
        summary.total_return = total_return(result.initial_capital, result.final_value);
        summary.cagr = cagr(result.initial_capital, result.final_value, summary.years);
        summary
    }

    /// Recompute everything from `records` alone; the final value is the
    /// last record's value.
    pub fn from_records(
        records: &[RebalanceRecord],
        initial_capital: f64,
        risk_free_rate: f64,
        periods_per_year: u32,
    ) -> Self {
        let final_value = records.last().map_or(initial_capital, |r| r.value);
        let years = match (records.first(), records.last()) {
            (Some(first), Some(last)) => {
                (last.valuation_date - first.date).num_days() as f64 / DAYS_PER_YEAR
            }
            _ => 0.0,
        };
        let returns: Vec<f64> = records.iter().filter_map(|r| r.period_return).collect();
        let drawdown = max_drawdown_from(initial_capital, &equity_curve(records));

        PerformanceSummary {
            initial_capital,
            final_value,
            total_return: total_return(initial_capital, final_value),
            max_drawdown: drawdown.map_or(0.0, |(dd, _)| dd),
            max_drawdown_date: drawdown.map(|(_, date)| date),
            cagr: cagr(initial_capital, final_value, years),
            sharpe: sharpe(&returns, risk_free_rate, periods_per_year),
            periods: records.len(),
            years,
        }
    }
}

/// Percent with two decimals, or "undefined (<reason>)".
pub fn format_percent(stat: &Result<f64, UndefinedStatistic>) -> String {
    match stat {
        Ok(v) => format!("{:.2}%", v * 100.0),
        Err(e) => format!("undefined ({e})"),
    }
}

pub fn format_ratio(stat: &Result<f64, UndefinedStatistic>) -> String {
    match stat {
        Ok(v) => format!("{v:.3}"),
        Err(e) => format!("undefined ({e})"),
    }
}
