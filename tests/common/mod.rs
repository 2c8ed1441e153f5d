#![allow(dead_code)]

use chrono::NaiveDate;
use krxquant::domain::error::KrxQuantError;
use krxquant::domain::event::BacktestEvent;
pub use krxquant::domain::panel::PanelRow;
use krxquant::ports::data_port::PanelSource;
use krxquant::ports::event_port::EventSink;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// In-memory panel source. `error` makes every call fail with a database error.
pub struct MockPanelSource {
    pub rows: Vec<PanelRow>,
    pub error: Option<String>,
}

impl MockPanelSource {
    pub fn new(rows: Vec<PanelRow>) -> Self {
        Self { rows, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(reason.to_string()),
        }
    }

    fn check(&self) -> Result<(), KrxQuantError> {
        match &self.error {
            Some(reason) => Err(KrxQuantError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PanelSource for MockPanelSource {
    fn fetch_panel(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PanelRow>, KrxQuantError> {
        self.check()?;
        let mut rows: Vec<PanelRow> = self
            .rows
            .iter()
            .filter(|r| r.date >= start_date && r.date <= end_date)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        Ok(rows)
    }

    fn list_tickers(&self) -> Result<Vec<String>, KrxQuantError> {
        self.check()?;
        let tickers: BTreeSet<String> = self.rows.iter().map(|r| r.ticker.clone()).collect();
        Ok(tickers.into_iter().collect())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxQuantError> {
        self.check()?;
        let min = self.rows.iter().map(|r| r.date).min();
        let max = self.rows.iter().map(|r| r.date).max();
        Ok(min.zip(max).map(|(a, b)| (a, b, self.rows.len())))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: RefCell<Vec<BacktestEvent>>,
}

impl RecordingSink {
    pub fn gaps(&self) -> usize {
        self.events.borrow().iter().filter(|e| e.is_gap()).count()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &BacktestEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A row that passes the default filter's sign checks.
pub fn make_row(date_str: &str, ticker: &str, close: f64, per: f64) -> PanelRow {
    PanelRow {
        date: date(date_str),
        ticker: ticker.to_string(),
        name: format!("{ticker} Corp"),
        close: Some(close),
        change_rate: Some(1.0),
        per: Some(per),
        pbr: Some(1.0),
        eps: Some(close / per),
        bps: Some(close),
        div: Some(2.0),
        ..Default::default()
    }
}

/// Same as [`make_row`] with the extra fields the quality-value and
/// small-value variants read.
pub fn make_full_row(
    date_str: &str,
    ticker: &str,
    close: f64,
    per: f64,
    pbr: f64,
    market_cap: f64,
) -> PanelRow {
    PanelRow {
        pbr: Some(pbr),
        bps: Some(close / pbr),
        market_cap: Some(market_cap),
        debt_ratio: Some(50.0),
        dividend_yield: Some(2.0),
        ..make_row(date_str, ticker, close, per)
    }
}

/// Month-end dates from January of `year`.
pub fn month_ends(year: i32, count: u32) -> Vec<String> {
    (1..=count)
        .map(|m| {
            let (y, next) = if m == 12 { (year + 1, 1) } else { (year, m + 1) };
            let first = NaiveDate::from_ymd_opt(y, next, 1).unwrap();
            first.pred_opt().unwrap().format("%Y-%m-%d").to_string()
        })
        .collect()
}
