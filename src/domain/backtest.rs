//! Monthly rebalance engine.
//!
//! For every rebalance date `d` with a successor `d'` the engine liquidates
//! prior holdings at `d`, filters and ranks the cross-section for `d`, spreads
//! cash evenly across the selection, and marks the ledger to market at `d'`.
//! The last date in range only closes out the value series.

use crate::domain::error::{DataGap, KrxQuantError};
use crate::domain::event::BacktestEvent;
use crate::domain::execution::CostModel;
use crate::domain::panel::Panel;
use crate::domain::portfolio::{EquityPoint, Ledger, RebalanceRecord, equity_curve};
use crate::domain::strategy::Strategy;
use crate::domain::universe::{self, FilterRules};
use crate::ports::event_port::EventSink;
use chrono::NaiveDate;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000_000.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;
pub const DEFAULT_PERIODS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub cost: CostModel,
    pub filter: FilterRules,
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
}

impl BacktestConfig {
    /// Baseline run: 10M initial capital, no frictions, default filter.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            cost: CostModel::default(),
            filter: FilterRules::default(),
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Liquidating,
    Selecting,
    Allocating,
    Valuing,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub records: Vec<RebalanceRecord>,
    pub initial_capital: f64,
    /// Valuation at the last date's own close.
    pub final_value: f64,
    pub ledger: Ledger,
    pub gap_count: usize,
}

impl BacktestResult {
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        equity_curve(&self.records)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_valuation_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.valuation_date)
    }

    /// Defined period returns, in order. Periods that started from a zero
    /// value are skipped.
    pub fn period_returns(&self) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.period_return).collect()
    }

    pub fn cash_only_periods(&self) -> usize {
        self.records.iter().filter(|r| r.cash_only).count()
    }
}

/// Drives one run. Owns the ledger; everything else is borrowed read-only.
pub struct RebalanceEngine<'a> {
    panel: &'a Panel,
    config: &'a BacktestConfig,
    strategy: &'a Strategy,
    sink: &'a dyn EventSink,
    ledger: Ledger,
    phase: EnginePhase,
    records: Vec<RebalanceRecord>,
    last_value: f64,
    peak: f64,
    gap_count: usize,
}

impl<'a> RebalanceEngine<'a> {
    pub fn new(
        panel: &'a Panel,
        config: &'a BacktestConfig,
        strategy: &'a Strategy,
        sink: &'a dyn EventSink,
    ) -> Self {
        RebalanceEngine {
            panel,
            config,
            strategy,
            sink,
            ledger: Ledger::new(config.initial_capital),
            phase: EnginePhase::Idle,
            records: Vec::new(),
            last_value: config.initial_capital,
            peak: config.initial_capital,
            gap_count: 0,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn records(&self) -> &[RebalanceRecord] {
        &self.records
    }

    /// One full rebalance at `date`, valued at `next`.
    pub fn step(&mut self, date: NaiveDate, next: NaiveDate) -> &RebalanceRecord {
        self.liquidate(date);

        let selected = self.select(date);
        let cash_only = selected.is_empty();
        if !cash_only {
            self.allocate(date, &selected);
        }

        let record = self.value(date, next, selected, cash_only);
        self.phase = EnginePhase::Idle;
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    fn liquidate(&mut self, date: NaiveDate) {
        self.phase = EnginePhase::Liquidating;
        for ticker in self.ledger.tickers() {
            let price = match self.panel.close(date, &ticker) {
                Ok(price) => price,
                Err(gap) => {
                    // carried forward to the next rebalance
                    self.report_gap(gap);
                    continue;
                }
            };
            let shares = self.ledger.shares(&ticker);
            let fill = self.config.cost.sell(price, shares);
            self.ledger.sell_all(&ticker, fill.cash);
            self.sink.on_event(&BacktestEvent::Liquidated {
                date,
                ticker,
                shares,
                price: fill.executed_price,
                proceeds: fill.cash,
            });
        }
    }

    fn select(&mut self, date: NaiveDate) -> Vec<String> {
        self.phase = EnginePhase::Selecting;
        let cross_section = self.panel.cross_section(date);
        let universe = universe::filter(&cross_section, &self.config.filter);
        let selected: Vec<String> = self
            .strategy
            .select(&universe, self.panel)
            .into_iter()
            .map(|r| r.ticker.clone())
            .collect();

        if selected.is_empty() {
            self.sink.on_event(&BacktestEvent::CashOnly {
                date,
                cash: self.ledger.cash,
            });
        } else {
            self.sink.on_event(&BacktestEvent::Selected {
                date,
                universe: universe.len(),
                tickers: selected.clone(),
            });
        }
        selected
    }

    fn allocate(&mut self, date: NaiveDate, selected: &[String]) {
        self.phase = EnginePhase::Allocating;
        let allocation = self.ledger.cash / selected.len() as f64;

        for ticker in selected {
            let price = match self.panel.close(date, ticker) {
                Ok(price) => price,
                Err(gap) => {
                    self.report_gap(gap);
                    continue;
                }
            };
            let shares = self.config.cost.affordable_shares(price, allocation);
            if shares == 0 {
                self.sink.on_event(&BacktestEvent::ZeroShares {
                    date,
                    ticker: ticker.clone(),
                    allocation,
                    price,
                });
                continue;
            }
            let fill = self.config.cost.buy(price, shares);
            self.ledger.buy(ticker, shares, fill.cash);
            self.sink.on_event(&BacktestEvent::Bought {
                date,
                ticker: ticker.clone(),
                shares,
                executed_price: fill.executed_price,
                cost: fill.cash,
            });
        }
    }

    fn value(
        &mut self,
        date: NaiveDate,
        next: NaiveDate,
        selected: Vec<String>,
        cash_only: bool,
    ) -> RebalanceRecord {
        self.phase = EnginePhase::Valuing;
        // a cash-only period holds its post-liquidation cash flat
        let (value, period_return) = if cash_only {
            (self.ledger.cash, Some(0.0))
        } else {
            let value = self.mark(next);
            let period_return = (self.last_value > 0.0).then(|| value / self.last_value - 1.0);
            (value, period_return)
        };
        self.peak = self.peak.max(value);
        let drawdown = if self.peak > 0.0 {
            (self.peak - value) / self.peak
        } else {
            0.0
        };
        self.last_value = value;

        self.sink.on_event(&BacktestEvent::Valued {
            date,
            valuation_date: next,
            value,
            period_return,
        });

        RebalanceRecord {
            date,
            valuation_date: next,
            selected,
            value,
            period_return,
            drawdown,
            cash_only,
        }
    }

    /// Cash plus holdings at `date`; missing closes count as zero.
    fn mark(&mut self, date: NaiveDate) -> f64 {
        let mut gaps = Vec::new();
        let value = self.ledger.mark(|ticker| match self.panel.close(date, ticker) {
            Ok(price) => Some(price),
            Err(gap) => {
                gaps.push(gap);
                None
            }
        });
        for gap in gaps {
            self.report_gap(gap);
        }
        value
    }

    fn report_gap(&mut self, gap: DataGap) {
        self.gap_count += 1;
        self.sink.on_event(&BacktestEvent::DataGap(gap));
    }

    /// Close out the run with a valuation at the final date's close. A
    /// holding step already marked the ledger there; a cash-only step did
    /// not, so carried holdings are marked now.
    pub fn finish(mut self) -> BacktestResult {
        let last = self.records.last().map(|r| (r.cash_only, r.valuation_date));
        let final_value = match last {
            Some((true, final_date)) => self.mark(final_date),
            Some((false, _)) => self.last_value,
            None => self.config.initial_capital,
        };
        self.phase = EnginePhase::Finished;
        BacktestResult {
            records: self.records,
            initial_capital: self.config.initial_capital,
            final_value,
            ledger: self.ledger,
            gap_count: self.gap_count,
        }
    }
}

/// Run `strategy` over every panel date in `[start_date, end_date]`.
///
/// Fails before touching the ledger when the range holds no panel dates or
/// the capital is not a positive amount.
pub fn run_backtest(
    panel: &Panel,
    config: &BacktestConfig,
    strategy: &Strategy,
    sink: &dyn EventSink,
) -> Result<BacktestResult, KrxQuantError> {
    if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
        return Err(KrxQuantError::malformed(format!(
            "initial capital must be positive, got {}",
            config.initial_capital
        )));
    }
    let dates = panel.dates_in(config.start_date, config.end_date);
    if dates.is_empty() {
        return Err(KrxQuantError::NoData {
            start: config.start_date,
            end: config.end_date,
        });
    }

    let mut engine = RebalanceEngine::new(panel, config, strategy, sink);
    for pair in dates.windows(2) {
        engine.step(pair[0], pair[1]);
    }
    Ok(engine.finish())
}
