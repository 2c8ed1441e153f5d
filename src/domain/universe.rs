//! Universe filter: drops non-economic and outlier rows from a cross-section.
//!
//! Percentile bounds are computed from the cross-section passed in, so they
//! move date by date with the peer distribution.

use crate::domain::panel::{CrossSection, PanelRow};

pub const DEFAULT_LOWER_PCT: f64 = 0.05;
pub const DEFAULT_UPPER_PCT: f64 = 0.95;

/// Fields a row must carry after trimming to stay in the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Close,
    Per,
    Pbr,
    Eps,
    Bps,
    Div,
}

impl RequiredField {
    fn present(self, row: &PanelRow) -> bool {
        let value = match self {
            RequiredField::Close => row.close,
            RequiredField::Per => row.per,
            RequiredField::Pbr => row.pbr,
            RequiredField::Eps => row.eps,
            RequiredField::Bps => row.bps,
            RequiredField::Div => row.div,
        };
        value.is_some_and(f64::is_finite)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRules {
    pub lower_pct: f64,
    pub upper_pct: f64,
    pub trim_pbr: bool,
    pub required: Vec<RequiredField>,
}

impl Default for FilterRules {
    fn default() -> Self {
        FilterRules {
            lower_pct: DEFAULT_LOWER_PCT,
            upper_pct: DEFAULT_UPPER_PCT,
            trim_pbr: false,
            required: vec![
                RequiredField::Close,
                RequiredField::Per,
                RequiredField::Pbr,
                RequiredField::Eps,
                RequiredField::Bps,
                RequiredField::Div,
            ],
        }
    }
}

impl FilterRules {
    /// Default rules plus the same percentile trim on PBR.
    pub fn strict() -> Self {
        FilterRules {
            trim_pbr: true,
            ..Default::default()
        }
    }
}

/// Linear-interpolated quantile of an ascending-sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn sorted_values<'a>(rows: &[&'a PanelRow], field: fn(&PanelRow) -> Option<f64>) -> Vec<f64> {
    let mut values: Vec<f64> = rows.iter().filter_map(|r| field(r)).collect();
    values.sort_by(f64::total_cmp);
    values
}

fn trim_band<'a>(
    rows: Vec<&'a PanelRow>,
    field: fn(&PanelRow) -> Option<f64>,
    rules: &FilterRules,
) -> Vec<&'a PanelRow> {
    let values = sorted_values(&rows, field);
    let (Some(lower), Some(upper)) = (
        quantile(&values, rules.lower_pct),
        quantile(&values, rules.upper_pct),
    ) else {
        return Vec::new();
    };
    rows.into_iter()
        .filter(|r| field(r).is_some_and(|v| v >= lower && v <= upper))
        .collect()
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|v| v > 0.0)
}

/// Apply `rules` to one cross-section. Always returns a (possibly empty)
/// subset of the input, preserving input order.
pub fn filter<'a>(cross_section: &CrossSection<'a>, rules: &FilterRules) -> CrossSection<'a> {
    let eligible: Vec<&'a PanelRow> = cross_section
        .rows
        .iter()
        .copied()
        .filter(|r| positive(r.per) && positive(r.eps) && positive(r.pbr))
        .collect();

    let mut trimmed = trim_band(eligible, |r| r.per, rules);
    if rules.trim_pbr {
        trimmed = trim_band(trimmed, |r| r.pbr, rules);
    }

    let rows = trimmed
        .into_iter()
        .filter(|r| rules.required.iter().all(|f| f.present(r)))
        .collect();

    CrossSection::new(cross_section.date, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
    }

    fn make_row(ticker: &str, per: f64, eps: f64, pbr: f64) -> PanelRow {
        PanelRow {
            date: date(),
            ticker: ticker.to_string(),
            name: ticker.to_string(),
            close: Some(1000.0),
            per: Some(per),
            eps: Some(eps),
            pbr: Some(pbr),
            bps: Some(5000.0),
            div: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn quantile_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(5.0));
        assert_eq!(quantile(&v, 0.5), Some(3.0));
        assert!((quantile(&v, 0.05).unwrap() - 1.2).abs() < 1e-12);
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&v, 1.5), None);
    }

    #[test]
    fn drops_non_positive_fundamentals() {
        let rows = vec![
            make_row("A", 10.0, 100.0, 1.0),
            make_row("B", -5.0, 100.0, 1.0),
            make_row("C", 10.0, 0.0, 1.0),
            make_row("D", 10.0, 100.0, -1.0),
        ];
        let cs = CrossSection::new(date(), rows.iter().collect());
        let rules = FilterRules {
            lower_pct: 0.0,
            upper_pct: 1.0,
            ..Default::default()
        };
        let out = filter(&cs, &rules);
        assert_eq!(out.tickers(), vec!["A"]);
    }

    #[test]
    fn trims_per_tails_within_cross_section() {
        let rows: Vec<PanelRow> = (1..=21)
            .map(|i| make_row(&format!("T{i:02}"), i as f64, 100.0, 1.0))
            .collect();
        let cs = CrossSection::new(date(), rows.iter().collect());
        let out = filter(&cs, &FilterRules::default());

        // 5th pct = 2.0, 95th pct = 20.0 on PER 1..=21
        assert_eq!(out.len(), 19);
        assert_eq!(out.rows.first().unwrap().ticker, "T02");
        assert_eq!(out.rows.last().unwrap().ticker, "T20");
    }

    #[test]
    fn strict_rules_also_trim_pbr() {
        let rows: Vec<PanelRow> = (1..=21)
            .map(|i| make_row(&format!("T{i:02}"), 10.0, 100.0, i as f64))
            .collect();
        let cs = CrossSection::new(date(), rows.iter().collect());

        assert_eq!(filter(&cs, &FilterRules::default()).len(), 21);
        assert_eq!(filter(&cs, &FilterRules::strict()).len(), 19);
    }

    #[test]
    fn drops_rows_missing_required_fields() {
        let mut missing_close = make_row("B", 10.0, 100.0, 1.0);
        missing_close.close = None;
        let mut missing_div = make_row("C", 10.0, 100.0, 1.0);
        missing_div.div = None;
        let rows = vec![make_row("A", 10.0, 100.0, 1.0), missing_close, missing_div];
        let cs = CrossSection::new(date(), rows.iter().collect());

        let out = filter(&cs, &FilterRules::default());
        assert_eq!(out.tickers(), vec!["A"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let cs = CrossSection::empty(date());
        let out = filter(&cs, &FilterRules::default());
        assert!(out.is_empty());
        assert_eq!(out.date, date());
    }

    #[test]
    fn all_rows_invalid_yields_empty_output() {
        let rows = vec![make_row("A", -1.0, 100.0, 1.0), make_row("B", 0.0, 100.0, 1.0)];
        let cs = CrossSection::new(date(), rows.iter().collect());
        assert!(filter(&cs, &FilterRules::default()).is_empty());
    }
}
