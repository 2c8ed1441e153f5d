//! Monthly panel rows, the date-indexed panel, and per-date cross-sections.

use crate::domain::error::{DataGap, KrxQuantError};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// One (date, ticker) observation of prices and fundamentals.
///
/// Numeric fields are optional because the store keeps them nullable; the
/// universe filter decides which ones a row must carry to be eligible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub name: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub change_rate: Option<f64>,
    pub per: Option<f64>,
    pub bps: Option<f64>,
    pub pbr: Option<f64>,
    pub eps: Option<f64>,
    pub dps: Option<f64>,
    pub div: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
}

impl PanelRow {
    /// EPS / BPS, when both are present and BPS is non-zero.
    pub fn roe(&self) -> Option<f64> {
        match (self.eps, self.bps) {
            (Some(eps), Some(bps)) if bps != 0.0 => Some(eps / bps),
            _ => None,
        }
    }

    /// Dividend yield column when loaded, otherwise DIV.
    pub fn yield_or_div(&self) -> Option<f64> {
        self.dividend_yield.or(self.div)
    }
}

/// All rows for one date, in (ticker) order unless re-ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection<'a> {
    pub date: NaiveDate,
    pub rows: Vec<&'a PanelRow>,
}

impl<'a> CrossSection<'a> {
    pub fn new(date: NaiveDate, rows: Vec<&'a PanelRow>) -> Self {
        Self { date, rows }
    }

    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.ticker.clone()).collect()
    }
}

/// Immutable in-memory panel keyed by (date, ticker).
#[derive(Debug, Clone)]
pub struct Panel {
    rows: Vec<PanelRow>,
    date_index: BTreeMap<NaiveDate, Range<usize>>,
    ticker_history: HashMap<String, Vec<usize>>,
}

impl Panel {
    /// Sorts rows by (date, ticker) and builds the lookup indexes.
    ///
    /// A repeated (date, ticker) key is malformed input.
    pub fn new(mut rows: Vec<PanelRow>) -> Result<Self, KrxQuantError> {
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));

        if let Some(w) = rows
            .windows(2)
            .find(|w| w[0].date == w[1].date && w[0].ticker == w[1].ticker)
        {
            return Err(KrxQuantError::malformed(format!(
                "duplicate panel row for {} on {}",
                w[0].ticker, w[0].date
            )));
        }

        let mut date_index: BTreeMap<NaiveDate, Range<usize>> = BTreeMap::new();
        let mut ticker_history: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, row) in rows.iter().enumerate() {
            date_index
                .entry(row.date)
                .and_modify(|r| r.end = i + 1)
                .or_insert(i..i + 1);
            ticker_history.entry(row.ticker.clone()).or_default().push(i);
        }

        Ok(Self {
            rows,
            date_index,
            ticker_history,
        })
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.date_index.keys().copied().collect()
    }

    /// Distinct dates within `[start, end]`, ascending.
    pub fn dates_in(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        self.date_index.range(start..=end).map(|(d, _)| *d).collect()
    }

    pub fn cross_section(&self, date: NaiveDate) -> CrossSection<'_> {
        match self.date_index.get(&date) {
            Some(range) => CrossSection::new(date, self.rows[range.clone()].iter().collect()),
            None => CrossSection::empty(date),
        }
    }

    pub fn get_row(&self, date: NaiveDate, ticker: &str) -> Option<&PanelRow> {
        let range = self.date_index.get(&date)?;
        let slice = &self.rows[range.clone()];
        slice
            .binary_search_by(|r| r.ticker.as_str().cmp(ticker))
            .ok()
            .map(|i| &slice[i])
    }

    /// Close price lookup with an explicit not-found outcome.
    pub fn close(&self, date: NaiveDate, ticker: &str) -> Result<f64, DataGap> {
        self.get_row(date, ticker)
            .and_then(|r| r.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| DataGap {
                date,
                ticker: ticker.to_string(),
                field: "close",
            })
    }

    /// Sum of the last `window` change rates for `ticker`, ending at `date`.
    ///
    /// The ticker needs a row with a change rate on each of the `window`
    /// consecutive panel dates ending at `date`; a skipped month gives `None`.
    pub fn trailing_change_sum(&self, ticker: &str, date: NaiveDate, window: usize) -> Option<f64> {
        if window == 0 {
            return None;
        }
        let history = self.ticker_history.get(ticker)?;
        let end = history.partition_point(|&i| self.rows[i].date <= date);
        if end < window {
            return None;
        }
        let observed = &history[end - window..end];
        let panel_dates = self.date_index.range(..=date).rev().take(window).map(|(d, _)| *d);
        let consecutive = observed
            .iter()
            .rev()
            .map(|&i| self.rows[i].date)
            .eq(panel_dates);
        if !consecutive {
            return None;
        }
        observed.iter().map(|&i| self.rows[i].change_rate).sum()
    }
}
