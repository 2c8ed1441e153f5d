//! Scoring and ranking for each strategy variant.
//!
//! All sorts are stable: rows that tie keep their cross-section order.

use crate::domain::panel::{CrossSection, Panel, PanelRow};
use crate::domain::universe::quantile;

const PER_WEIGHT: f64 = 0.3;
const PBR_WEIGHT: f64 = 0.3;
const ROE_WEIGHT: f64 = 0.2;
const MOMENTUM_WEIGHT: f64 = 0.2;

const QV_ROE_WEIGHT: f64 = 0.3;
const QV_DEBT_WEIGHT: f64 = 0.2;
const QV_PER_WEIGHT: f64 = 0.2;
const QV_PBR_WEIGHT: f64 = 0.2;
const QV_DIVIDEND_WEIGHT: f64 = 0.1;

const SMALL_VALUE_PCT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Keep rows that have a key, stable-sort by it, and take the first `n`.
fn top_by<'a>(
    rows: &[&'a PanelRow],
    key: impl Fn(&PanelRow) -> Option<f64>,
    order: Order,
    n: usize,
) -> Vec<&'a PanelRow> {
    let mut keyed: Vec<(&'a PanelRow, f64)> = rows
        .iter()
        .filter_map(|&r| key(r).filter(|v| v.is_finite()).map(|v| (r, v)))
        .collect();
    match order {
        Order::Ascending => keyed.sort_by(|a, b| a.1.total_cmp(&b.1)),
        Order::Descending => keyed.sort_by(|a, b| b.1.total_cmp(&a.1)),
    }
    keyed.into_iter().take(n).map(|(r, _)| r).collect()
}

pub fn lowest_per<'a>(rows: &[&'a PanelRow], max_stocks: usize) -> Vec<&'a PanelRow> {
    top_by(rows, |r| r.per, Order::Ascending, max_stocks)
}

/// Lower half by PER (odd counts round down), then the largest DIV.
pub fn low_per_high_div<'a>(rows: &[&'a PanelRow], max_stocks: usize) -> Vec<&'a PanelRow> {
    let with_per = rows.iter().filter(|r| r.per.is_some()).count();
    let cheap = top_by(rows, |r| r.per, Order::Ascending, with_per / 2);
    top_by(&cheap, |r| r.div, Order::Descending, max_stocks)
}

/// Weighted factor total for one row, or `None` when any input is missing.
pub fn combined_total(row: &PanelRow, momentum: Option<f64>) -> Option<f64> {
    let per = row.per.filter(|v| *v != 0.0)?;
    let pbr = row.pbr.filter(|v| *v != 0.0)?;
    let roe = row.roe()?;
    let momentum = momentum?;
    Some(
        PER_WEIGHT * (1.0 / per)
            + PBR_WEIGHT * (1.0 / pbr)
            + ROE_WEIGHT * roe
            + MOMENTUM_WEIGHT * momentum,
    )
}

pub fn combined_score<'a>(
    cross_section: &CrossSection<'a>,
    history: &Panel,
    max_stocks: usize,
    momentum_window: usize,
) -> Vec<&'a PanelRow> {
    let date = cross_section.date;
    top_by(
        &cross_section.rows,
        |r| {
            let momentum = history.trailing_change_sum(&r.ticker, date, momentum_window);
            combined_total(r, momentum)
        },
        Order::Descending,
        max_stocks,
    )
}

/// 1-based ranks with ties averaged; missing values rank after all present
/// ones (tied among themselves).
pub fn average_ranks(values: &[Option<f64>], order: Order) -> Vec<f64> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    match order {
        Order::Ascending => present.sort_by(|a, b| a.1.total_cmp(&b.1)),
        Order::Descending => present.sort_by(|a, b| b.1.total_cmp(&a.1)),
    }

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len() && present[end].1 == present[start].1 {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &(i, _) in &present[start..end] {
            ranks[i] = avg;
        }
        start = end;
    }

    let missing: Vec<usize> = (0..values.len())
        .filter(|&i| !values[i].is_some_and(f64::is_finite))
        .collect();
    if !missing.is_empty() {
        let avg = (present.len() + 1 + values.len()) as f64 / 2.0;
        for i in missing {
            ranks[i] = avg;
        }
    }
    ranks
}

/// Composite of weighted ranks; lower is better.
pub fn quality_value_composite(rows: &[&PanelRow]) -> Vec<f64> {
    let column = |f: fn(&PanelRow) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(|r| f(r)).collect()
    };
    let roe = average_ranks(&column(PanelRow::roe), Order::Descending);
    let debt = average_ranks(&column(|r| r.debt_ratio), Order::Ascending);
    let per = average_ranks(&column(|r| r.per), Order::Ascending);
    let pbr = average_ranks(&column(|r| r.pbr), Order::Ascending);
    let dividend = average_ranks(&column(PanelRow::yield_or_div), Order::Descending);

    (0..rows.len())
        .map(|i| {
            QV_ROE_WEIGHT * roe[i]
                + QV_DEBT_WEIGHT * debt[i]
                + QV_PER_WEIGHT * per[i]
                + QV_PBR_WEIGHT * pbr[i]
                + QV_DIVIDEND_WEIGHT * dividend[i]
        })
        .collect()
}

/// Rows whose composite rank falls within the top `top_fraction` of the date.
pub fn quality_value<'a>(rows: &[&'a PanelRow], top_fraction: f64) -> Vec<&'a PanelRow> {
    let composite = quality_value_composite(rows);
    let composite_rank =
        average_ranks(&composite.iter().map(|&c| Some(c)).collect::<Vec<_>>(), Order::Ascending);
    let cutoff = rows.len() as f64 * top_fraction;

    let mut kept: Vec<(&'a PanelRow, f64)> = rows
        .iter()
        .zip(composite.iter().zip(composite_rank.iter()))
        .filter(|(_, (_, rank))| **rank <= cutoff)
        .map(|(&r, (&c, _))| (r, c))
        .collect();
    kept.sort_by(|a, b| a.1.total_cmp(&b.1));
    kept.into_iter().map(|(r, _)| r).collect()
}

/// Bottom 30% market cap and bottom 30% PBR, ROE at or above the subset
/// median, ranked by ROE / PBR.
pub fn small_value<'a>(rows: &[&'a PanelRow], max_stocks: usize) -> Vec<&'a PanelRow> {
    let sorted = |f: fn(&PanelRow) -> Option<f64>| -> Vec<f64> {
        let mut v: Vec<f64> = rows.iter().filter_map(|r| f(r)).filter(|x| x.is_finite()).collect();
        v.sort_by(f64::total_cmp);
        v
    };
    let (Some(cap_cut), Some(pbr_cut)) = (
        quantile(&sorted(|r| r.market_cap), SMALL_VALUE_PCT),
        quantile(&sorted(|r| r.pbr), SMALL_VALUE_PCT),
    ) else {
        return Vec::new();
    };

    let restricted: Vec<(&'a PanelRow, f64, f64)> = rows
        .iter()
        .filter_map(|&r| {
            let cap = r.market_cap?;
            let pbr = r.pbr.filter(|p| *p > 0.0)?;
            let roe = r.roe()?;
            (cap <= cap_cut && pbr <= pbr_cut).then_some((r, pbr, roe))
        })
        .collect();

    let mut roes: Vec<f64> = restricted.iter().map(|(_, _, roe)| *roe).collect();
    roes.sort_by(f64::total_cmp);
    let Some(median_roe) = quantile(&roes, 0.5) else {
        return Vec::new();
    };

    let mut scored: Vec<(&'a PanelRow, f64)> = restricted
        .into_iter()
        .filter(|(_, _, roe)| *roe >= median_roe)
        .map(|(r, pbr, roe)| (r, roe / pbr))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(max_stocks).map(|(r, _)| r).collect()
}
