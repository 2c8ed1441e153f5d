//! Decisions and warnings the rebalance engine reports while it runs.

use crate::domain::error::DataGap;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum BacktestEvent {
    /// A prior holding was converted to cash at the rebalance close.
    Liquidated {
        date: NaiveDate,
        ticker: String,
        shares: u64,
        price: f64,
        proceeds: f64,
    },
    /// The strategy picked these tickers out of `universe` eligible rows.
    Selected {
        date: NaiveDate,
        universe: usize,
        tickers: Vec<String>,
    },
    /// Nothing eligible or nothing selected; the period holds cash.
    CashOnly { date: NaiveDate, cash: f64 },
    Bought {
        date: NaiveDate,
        ticker: String,
        shares: u64,
        executed_price: f64,
        cost: f64,
    },
    /// Allocation too small to buy a single share.
    ZeroShares {
        date: NaiveDate,
        ticker: String,
        allocation: f64,
        price: f64,
    },
    Valued {
        date: NaiveDate,
        valuation_date: NaiveDate,
        value: f64,
        period_return: Option<f64>,
    },
    DataGap(DataGap),
}

impl BacktestEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            BacktestEvent::Liquidated { date, .. }
            | BacktestEvent::Selected { date, .. }
            | BacktestEvent::CashOnly { date, .. }
            | BacktestEvent::Bought { date, .. }
            | BacktestEvent::ZeroShares { date, .. }
            | BacktestEvent::Valued { date, .. } => *date,
            BacktestEvent::DataGap(gap) => gap.date,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, BacktestEvent::DataGap(_))
    }
}

impl From<DataGap> for BacktestEvent {
    fn from(gap: DataGap) -> Self {
        BacktestEvent::DataGap(gap)
    }
}
