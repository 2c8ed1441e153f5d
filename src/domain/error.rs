//! Domain error types.

use chrono::NaiveDate;

/// A missing price or fundamental for a ticker on a date.
///
/// Never fatal: the engine reports it to the event sink and degrades.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("data gap: no {field} for {ticker} on {date}")]
pub struct DataGap {
    pub date: NaiveDate,
    pub ticker: String,
    pub field: &'static str,
}

/// A performance statistic that cannot be computed from the given series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UndefinedStatistic {
    #[error("period length must be positive")]
    NonPositiveYears,

    #[error("initial value must be positive")]
    NonPositiveInitial,

    #[error("excess returns have zero volatility")]
    ZeroVolatility,

    #[error("at least two period returns are required")]
    InsufficientReturns,
}

/// Top-level error type for krxquant.
#[derive(Debug, thiserror::Error)]
pub enum KrxQuantError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("no panel data between {start} and {end}")]
    NoData { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KrxQuantError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        KrxQuantError::MalformedInput {
            reason: reason.into(),
        }
    }
}

impl From<&KrxQuantError> for std::process::ExitCode {
    fn from(err: &KrxQuantError) -> Self {
        let code: u8 = match err {
            KrxQuantError::Io(_) => 1,
            KrxQuantError::ConfigParse { .. }
            | KrxQuantError::ConfigMissing { .. }
            | KrxQuantError::ConfigInvalid { .. } => 2,
            KrxQuantError::Database { .. } | KrxQuantError::DatabaseQuery { .. } => 3,
            KrxQuantError::MalformedInput { .. } => 4,
            KrxQuantError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_gap_display() {
        let gap = DataGap {
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            ticker: "005930".into(),
            field: "close",
        };
        assert_eq!(gap.to_string(), "data gap: no close for 005930 on 2024-01-31");
    }

    #[test]
    fn malformed_helper_builds_variant() {
        let err = KrxQuantError::malformed("missing column PER");
        assert!(matches!(err, KrxQuantError::MalformedInput { reason } if reason == "missing column PER"));
    }

    #[test]
    fn no_data_display() {
        let err = KrxQuantError::NoData {
            start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2015, 12, 31).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "no panel data between 2015-01-01 and 2015-12-31"
        );
    }

    #[test]
    fn undefined_statistic_display() {
        assert_eq!(
            UndefinedStatistic::ZeroVolatility.to_string(),
            "excess returns have zero volatility"
        );
    }
}
