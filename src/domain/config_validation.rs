//! Configuration validation.
//!
//! Checks every field a run depends on before any data is loaded, naming the
//! offending section and key.

use crate::domain::backtest::DEFAULT_INITIAL_CAPITAL;
use crate::domain::error::KrxQuantError;
use crate::domain::strategy::Strategy;
use crate::domain::universe::{DEFAULT_LOWER_PCT, DEFAULT_UPPER_PCT};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

const FRICTION_KEYS: [&str; 4] = ["buy_slippage", "buy_fee", "sell_slippage", "sell_fee"];

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> KrxQuantError {
    KrxQuantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    validate_initial_capital(config)?;
    validate_frictions(config)?;
    validate_risk_free_rate(config)?;
    validate_periods_per_year(config)?;
    validate_dates(config)?;
    Ok(())
}

/// `name_override` stands in for `[strategy] name` when given.
pub fn validate_strategy_config(
    config: &dyn ConfigPort,
    name_override: Option<&str>,
) -> Result<(), KrxQuantError> {
    validate_strategy_name(config, name_override)?;
    validate_max_stocks(config)?;
    validate_momentum_window(config)?;
    validate_top_fraction(config)?;
    Ok(())
}

pub fn validate_filter_config(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    let lower = config.get_double("filter", "lower_pct", DEFAULT_LOWER_PCT);
    let upper = config.get_double("filter", "upper_pct", DEFAULT_UPPER_PCT);
    if !(0.0..=1.0).contains(&lower) {
        return Err(invalid("filter", "lower_pct", "lower_pct must be between 0 and 1"));
    }
    if !(0.0..=1.0).contains(&upper) {
        return Err(invalid("filter", "upper_pct", "upper_pct must be between 0 and 1"));
    }
    if lower >= upper {
        return Err(invalid(
            "filter",
            "lower_pct",
            "lower_pct must be below upper_pct",
        ));
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    let value = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_frictions(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    for key in FRICTION_KEYS {
        let value = config.get_double("backtest", key, 0.0);
        if !(0.0..1.0).contains(&value) {
            return Err(invalid(
                "backtest",
                key,
                format!("{key} must be a fraction in [0, 1)"),
            ));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    let value = config.get_int("backtest", "periods_per_year", 12);
    if !(1..=366).contains(&value) {
        return Err(invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be between 1 and 366",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

/// Reads a required `[backtest]` date in `YYYY-MM-DD` form.
pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, KrxQuantError> {
    let value = config
        .get_string("backtest", field)
        .ok_or_else(|| KrxQuantError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        })?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        invalid(
            "backtest",
            field,
            format!("invalid {field} format, expected YYYY-MM-DD"),
        )
    })
}

fn validate_strategy_name(
    config: &dyn ConfigPort,
    name_override: Option<&str>,
) -> Result<(), KrxQuantError> {
    let name = match name_override {
        Some(name) => name.to_string(),
        None => config
            .get_string("strategy", "name")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| KrxQuantError::ConfigMissing {
                section: "strategy".to_string(),
                key: "name".to_string(),
            })?,
    };
    name.parse::<Strategy>()
        .map(|_| ())
        .map_err(|e| invalid("strategy", "name", e.to_string()))
}

fn validate_max_stocks(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    if config.get_int("strategy", "max_stocks", 20) < 1 {
        return Err(invalid(
            "strategy",
            "max_stocks",
            "max_stocks must be at least 1",
        ));
    }
    Ok(())
}

fn validate_momentum_window(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    if config.get_int("strategy", "momentum_window", 12) < 1 {
        return Err(invalid(
            "strategy",
            "momentum_window",
            "momentum_window must be at least 1",
        ));
    }
    Ok(())
}

fn validate_top_fraction(config: &dyn ConfigPort) -> Result<(), KrxQuantError> {
    let value = config.get_double("strategy", "top_fraction", 0.3);
    if value <= 0.0 || value > 1.0 || value.is_nan() {
        return Err(invalid(
            "strategy",
            "top_fraction",
            "top_fraction must be in (0, 1]",
        ));
    }
    Ok(())
}
