//! Trading cost model: slippage and proportional fees per leg.
//!
//! Rates are fractions (0.001 = 0.1%). Buys pay adverse slippage upward and
//! the fee on top; sells receive adverse slippage downward and pay the fee out
//! of proceeds. The baseline model only charges the buy leg.

/// Executed price and cash moved by a fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub executed_price: f64,
    /// Cash paid for a buy, cash received for a sell.
    pub cash: f64,
}

impl Fill {
    const NONE: Fill = Fill {
        executed_price: 0.0,
        cash: 0.0,
    };
}

/// `executed_price = price * (1 + slippage)`, `total_cost = executed * shares * (1 + fee)`.
///
/// Zero shares is a no-op with zero cost.
pub fn execute(theoretical_price: f64, shares: u64, slippage_rate: f64, fee_rate: f64) -> (f64, f64) {
    if shares == 0 {
        return (0.0, 0.0);
    }
    let executed_price = theoretical_price * (1.0 + slippage_rate);
    let total_cost = executed_price * shares as f64 * (1.0 + fee_rate);
    (executed_price, total_cost)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub buy_slippage: f64,
    pub buy_fee: f64,
    pub sell_slippage: f64,
    pub sell_fee: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            buy_slippage: 0.0,
            buy_fee: 0.0,
            sell_slippage: 0.0,
            sell_fee: 0.0,
        }
    }
}

impl CostModel {
    /// Buy-side frictions only; sells liquidate at the unadjusted close.
    pub fn buy_side(slippage: f64, fee: f64) -> Self {
        CostModel {
            buy_slippage: slippage,
            buy_fee: fee,
            ..Default::default()
        }
    }

    pub fn buy(&self, price: f64, shares: u64) -> Fill {
        let (executed_price, cash) = execute(price, shares, self.buy_slippage, self.buy_fee);
        Fill {
            executed_price,
            cash,
        }
    }

    pub fn sell(&self, price: f64, shares: u64) -> Fill {
        if shares == 0 {
            return Fill::NONE;
        }
        let executed_price = price * (1.0 - self.sell_slippage);
        Fill {
            executed_price,
            cash: executed_price * shares as f64 * (1.0 - self.sell_fee),
        }
    }

    /// All-in cash needed per share on the buy leg.
    pub fn buy_unit_cost(&self, price: f64) -> f64 {
        price * (1.0 + self.buy_slippage) * (1.0 + self.buy_fee)
    }

    /// Whole shares purchasable with `budget`, frictions included.
    pub fn affordable_shares(&self, price: f64, budget: f64) -> u64 {
        let unit = self.buy_unit_cost(price);
        if unit.is_nan() || budget.is_nan() || unit <= 0.0 || budget <= 0.0 {
            return 0;
        }
        let mut shares = (budget / unit).floor() as u64;
        // floor() can land one share over budget after rounding
        while shares > 0 && self.buy(price, shares).cash > budget {
            shares -= 1;
        }
        shares
    }
}
