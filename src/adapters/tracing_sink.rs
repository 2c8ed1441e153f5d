//! Event sink that forwards engine events to `tracing`.
//!
//! Data gaps are warnings, per-period decisions are info, and per-trade
//! detail is debug so a default `info` filter keeps one line per decision.

use crate::domain::event::BacktestEvent;
use crate::ports::event_port::EventSink;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &BacktestEvent) {
        match event {
            BacktestEvent::DataGap(gap) => {
                warn!(date = %gap.date, ticker = %gap.ticker, field = gap.field, "data gap");
            }
            BacktestEvent::Selected {
                date,
                universe,
                tickers,
            } => {
                info!(
                    date = %date,
                    universe = *universe,
                    selected = tickers.len(),
                    tickers = %tickers.join(","),
                    "selection"
                );
            }
            BacktestEvent::CashOnly { date, cash } => {
                info!(date = %date, cash = *cash, "nothing selected, holding cash");
            }
            BacktestEvent::Valued {
                date,
                valuation_date,
                value,
                period_return: Some(period_return),
            } => {
                info!(
                    date = %date,
                    valuation_date = %valuation_date,
                    value = *value,
                    period_return = *period_return,
                    "period valued"
                );
            }
            BacktestEvent::Valued {
                date,
                valuation_date,
                value,
                period_return: None,
            } => {
                warn!(
                    date = %date,
                    valuation_date = %valuation_date,
                    value = *value,
                    "period valued from a zero value, return undefined"
                );
            }
            BacktestEvent::Liquidated {
                date,
                ticker,
                shares,
                price,
                proceeds,
            } => {
                debug!(
                    date = %date,
                    ticker = %ticker,
                    shares = *shares,
                    price = *price,
                    proceeds = *proceeds,
                    "liquidated"
                );
            }
            BacktestEvent::Bought {
                date,
                ticker,
                shares,
                executed_price,
                cost,
            } => {
                debug!(
                    date = %date,
                    ticker = %ticker,
                    shares = *shares,
                    executed_price = *executed_price,
                    cost = *cost,
                    "bought"
                );
            }
            BacktestEvent::ZeroShares {
                date,
                ticker,
                allocation,
                price,
            } => {
                debug!(
                    date = %date,
                    ticker = %ticker,
                    allocation = *allocation,
                    price = *price,
                    "allocation below one share"
                );
            }
        }
    }
}
