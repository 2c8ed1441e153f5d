//! Factor strategy variants.
//!
//! A `Strategy` is chosen once per run and never switched mid-run. Each
//! variant ranks a filtered cross-section and returns the rows to hold.

use crate::domain::panel::{CrossSection, Panel, PanelRow};
use crate::domain::selection;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MAX_STOCKS: usize = 20;
pub const DEFAULT_MOMENTUM_WINDOW: usize = 12;
pub const DEFAULT_TOP_FRACTION: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// N rows with the smallest PER.
    LowestPer { max_stocks: usize },
    /// Lower half by PER, then the N largest DIV.
    LowPerHighDiv { max_stocks: usize },
    /// Weighted 1/PER, 1/PBR, ROE and trailing momentum.
    CombinedScore {
        max_stocks: usize,
        momentum_window: usize,
    },
    /// Rank composite over ROE, debt ratio, PER, PBR and dividend yield.
    QualityValue { top_fraction: f64 },
    /// Small caps with low PBR and above-median ROE, scored by ROE/PBR.
    SmallValue { max_stocks: usize },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::LowestPer { .. } => "lowest_per",
            Strategy::LowPerHighDiv { .. } => "low_per_high_div",
            Strategy::CombinedScore { .. } => "combined_score",
            Strategy::QualityValue { .. } => "quality_value",
            Strategy::SmallValue { .. } => "small_value",
        }
    }

    /// Rank `cross_section` and return the chosen rows, best first.
    ///
    /// `history` supplies trailing data for variants that look back in time.
    /// An empty result means "hold cash this period".
    pub fn select<'a>(&self, cross_section: &CrossSection<'a>, history: &Panel) -> Vec<&'a PanelRow> {
        if cross_section.is_empty() {
            return Vec::new();
        }
        match *self {
            Strategy::LowestPer { max_stocks } => {
                selection::lowest_per(&cross_section.rows, max_stocks)
            }
            Strategy::LowPerHighDiv { max_stocks } => {
                selection::low_per_high_div(&cross_section.rows, max_stocks)
            }
            Strategy::CombinedScore {
                max_stocks,
                momentum_window,
            } => selection::combined_score(cross_section, history, max_stocks, momentum_window),
            Strategy::QualityValue { top_fraction } => {
                selection::quality_value(&cross_section.rows, top_fraction)
            }
            Strategy::SmallValue { max_stocks } => {
                selection::small_value(&cross_section.rows, max_stocks)
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::LowestPer { max_stocks }
            | Strategy::LowPerHighDiv { max_stocks }
            | Strategy::SmallValue { max_stocks } => {
                write!(f, "{}(max_stocks={})", self.name(), max_stocks)
            }
            Strategy::CombinedScore {
                max_stocks,
                momentum_window,
            } => write!(
                f,
                "{}(max_stocks={}, momentum_window={})",
                self.name(),
                max_stocks,
                momentum_window
            ),
            Strategy::QualityValue { top_fraction } => {
                write!(f, "{}(top_fraction={})", self.name(), top_fraction)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy: {0}")]
pub struct UnknownStrategy(pub String);

/// Parses a strategy name with default parameters.
impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "lowest_per" | "low_per" => Ok(Strategy::LowestPer {
                max_stocks: DEFAULT_MAX_STOCKS,
            }),
            "low_per_high_div" | "high_div" => Ok(Strategy::LowPerHighDiv {
                max_stocks: DEFAULT_MAX_STOCKS,
            }),
            "combined_score" => Ok(Strategy::CombinedScore {
                max_stocks: DEFAULT_MAX_STOCKS,
                momentum_window: DEFAULT_MOMENTUM_WINDOW,
            }),
            "quality_value" => Ok(Strategy::QualityValue {
                top_fraction: DEFAULT_TOP_FRACTION,
            }),
            "small_value" => Ok(Strategy::SmallValue {
                max_stocks: DEFAULT_MAX_STOCKS,
            }),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parse_known_names() {
        assert_eq!(
            "lowest_per".parse::<Strategy>().unwrap(),
            Strategy::LowestPer { max_stocks: 20 }
        );
        assert_eq!(
            "Low PER High DIV".parse::<Strategy>().unwrap(),
            Strategy::LowPerHighDiv { max_stocks: 20 }
        );
        assert_eq!(
            "combined-score".parse::<Strategy>().unwrap(),
            Strategy::CombinedScore {
                max_stocks: 20,
                momentum_window: 12
            }
        );
        assert_eq!(
            "quality_value".parse::<Strategy>().unwrap(),
            Strategy::QualityValue { top_fraction: 0.3 }
        );
        assert_eq!(
            "small_value".parse::<Strategy>().unwrap(),
            Strategy::SmallValue { max_stocks: 20 }
        );
    }

    #[test]
    fn parse_unknown_name() {
        let err = "momentum".parse::<Strategy>().unwrap_err();
        assert_eq!(err.to_string(), "unknown strategy: momentum");
    }

    #[test]
    fn name_round_trips_through_parse() {
        for name in [
            "lowest_per",
            "low_per_high_div",
            "combined_score",
            "quality_value",
            "small_value",
        ] {
            assert_eq!(name.parse::<Strategy>().unwrap().name(), name);
        }
    }

    #[test]
    fn display_includes_parameters() {
        let s = Strategy::CombinedScore {
            max_stocks: 10,
            momentum_window: 6,
        };
        assert_eq!(
            s.to_string(),
            "combined_score(max_stocks=10, momentum_window=6)"
        );
    }

    #[test]
    fn every_variant_returns_empty_for_empty_input() {
        let panel = Panel::new(Vec::new()).unwrap();
        let cs = CrossSection::empty(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        for s in [
            Strategy::LowestPer { max_stocks: 5 },
            Strategy::LowPerHighDiv { max_stocks: 5 },
            Strategy::CombinedScore {
                max_stocks: 5,
                momentum_window: 12,
            },
            Strategy::QualityValue { top_fraction: 0.3 },
            Strategy::SmallValue { max_stocks: 5 },
        ] {
            assert!(s.select(&cs, &panel).is_empty(), "{s} should select nothing");
        }
    }
}
