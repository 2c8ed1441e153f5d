//! Portfolio ledger and the per-period rebalance records.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Cash plus whole-share holdings. Only the rebalance engine mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub cash: f64,
    holdings: BTreeMap<String, u64>,
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Ledger {
            cash: initial_cash,
            holdings: BTreeMap::new(),
        }
    }

    /// Add `shares` of `ticker` and pay `cost` out of cash.
    pub fn buy(&mut self, ticker: &str, shares: u64, cost: f64) {
        if shares == 0 {
            return;
        }
        *self.holdings.entry(ticker.to_string()).or_insert(0) += shares;
        self.cash -= cost;
    }

    /// Remove the whole holding and credit `proceeds`. Returns the shares sold.
    pub fn sell_all(&mut self, ticker: &str, proceeds: f64) -> Option<u64> {
        let shares = self.holdings.remove(ticker)?;
        self.cash += proceeds;
        Some(shares)
    }

    pub fn shares(&self, ticker: &str) -> u64 {
        self.holdings.get(ticker).copied().unwrap_or(0)
    }

    pub fn holdings(&self) -> impl Iterator<Item = (&str, u64)> {
        self.holdings.iter().map(|(t, s)| (t.as_str(), *s))
    }

    /// Snapshot of held tickers, in ticker order.
    pub fn tickers(&self) -> Vec<String> {
        self.holdings.keys().cloned().collect()
    }

    pub fn position_count(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_flat(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Cash plus each holding at the price `price_of` returns; holdings
    /// without a price contribute zero.
    pub fn mark(&self, mut price_of: impl FnMut(&str) -> Option<f64>) -> f64 {
        let held: f64 = self
            .holdings
            .iter()
            .filter_map(|(ticker, &shares)| price_of(ticker).map(|p| p * shares as f64))
            .sum();
        self.cash + held
    }
}

/// One (date, value) point of the portfolio value series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// The outcome of one rebalance step. Created once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceRecord {
    /// Rebalance date the selection was made on.
    pub date: NaiveDate,
    /// Next rebalance date, where the period was marked to market.
    pub valuation_date: NaiveDate,
    pub selected: Vec<String>,
    pub value: f64,
    /// `None` when the period started from a zero value.
    pub period_return: Option<f64>,
    pub drawdown: f64,
    pub cash_only: bool,
}

impl RebalanceRecord {
    pub fn equity_point(&self) -> EquityPoint {
        EquityPoint {
            date: self.date,
            value: self.value,
        }
    }
}

/// Value series of a record sequence, one point per rebalance date.
pub fn equity_curve(records: &[RebalanceRecord]) -> Vec<EquityPoint> {
    records.iter().map(RebalanceRecord::equity_point).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ledger_is_all_cash() {
        let ledger = Ledger::new(10_000_000.0);
        assert!((ledger.cash - 10_000_000.0).abs() < f64::EPSILON);
        assert!(ledger.is_flat());
        assert_eq!(ledger.position_count(), 0);
    }

    #[test]
    fn buy_adds_shares_and_pays_cost() {
        let mut ledger = Ledger::new(1_000.0);
        ledger.buy("A", 3, 300.0);
        ledger.buy("A", 2, 200.0);
        assert_eq!(ledger.shares("A"), 5);
        assert!((ledger.cash - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_zero_shares_is_noop() {
        let mut ledger = Ledger::new(1_000.0);
        ledger.buy("A", 0, 0.0);
        assert!(ledger.is_flat());
        assert!((ledger.cash - 1_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_all_removes_holding() {
        let mut ledger = Ledger::new(0.0);
        ledger.buy("A", 10, 0.0);
        assert_eq!(ledger.sell_all("A", 1_100.0), Some(10));
        assert_eq!(ledger.shares("A"), 0);
        assert!((ledger.cash - 1_100.0).abs() < f64::EPSILON);
        assert_eq!(ledger.sell_all("A", 1.0), None);
        assert!((ledger.cash - 1_100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn holdings_iterate_in_ticker_order() {
        let mut ledger = Ledger::new(0.0);
        ledger.buy("C", 1, 0.0);
        ledger.buy("A", 2, 0.0);
        ledger.buy("B", 3, 0.0);
        let held: Vec<_> = ledger.holdings().collect();
        assert_eq!(held, vec![("A", 2), ("B", 3), ("C", 1)]);
        assert_eq!(ledger.tickers(), vec!["A", "B", "C"]);
    }

    #[test]
    fn mark_skips_missing_prices() {
        let mut ledger = Ledger::new(100.0);
        ledger.buy("A", 10, 0.0);
        ledger.buy("B", 5, 0.0);
        let value = ledger.mark(|t| if t == "A" { Some(20.0) } else { None });
        assert!((value - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equity_curve_follows_records() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let records = vec![RebalanceRecord {
            date: d,
            valuation_date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            selected: vec!["A".into()],
            value: 110.0,
            period_return: Some(0.1),
            drawdown: 0.0,
            cash_only: false,
        }];
        assert_eq!(
            equity_curve(&records),
            vec![EquityPoint {
                date: d,
                value: 110.0
            }]
        );
    }
}
