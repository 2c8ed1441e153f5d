//! Standalone SVG chart of the portfolio value series.
//!
//! The polyline connects one point per rebalance record; a red circle marks
//! the max-drawdown date when one exists.

use crate::domain::metrics::PerformanceSummary;
use crate::domain::portfolio::{EquityPoint, RebalanceRecord, equity_curve};

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 300.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;

struct Scale {
    min: f64,
    range: f64,
    len: usize,
}

impl Scale {
    fn new(points: &[EquityPoint], initial: f64) -> Self {
        let min = points.iter().map(|p| p.value).fold(initial, f64::min);
        let max = points.iter().map(|p| p.value).fold(initial, f64::max);
        Scale {
            min,
            range: (max - min).max(1.0),
            len: points.len(),
        }
    }

    fn plot_width() -> f64 {
        CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn x(&self, i: usize) -> f64 {
        MARGIN_LEFT + (i as f64 / (self.len.saturating_sub(1)).max(1) as f64) * Self::plot_width()
    }

    fn y(&self, v: f64) -> f64 {
        MARGIN_TOP + Self::plot_height() - ((v - self.min) / self.range) * Self::plot_height()
    }
}

fn fmt_won(v: f64) -> String {
    let whole = v.round().abs() as u64;
    let digits = whole.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if v < 0.0 {
        format!("-{out}")
    } else {
        out
    }
}

/// Render the value curve. Returns an empty string when there are no records.
pub fn render_value_chart(records: &[RebalanceRecord], summary: &PerformanceSummary) -> String {
    let points = equity_curve(records);
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return String::new();
    };
    let scale = Scale::new(&points, summary.initial_capital);

    let polyline: Vec<String> = points
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{:.1},{:.1}", scale.x(i), scale.y(p.value)))
        .collect();

    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"15\" text-anchor=\"end\" font-size=\"12\" fill=\"#666\">Portfolio value (KRW)</text>\n",
        CHART_WIDTH - MARGIN_RIGHT
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM,
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        MARGIN_LEFT - 5.0,
        MARGIN_TOP + 5.0,
        fmt_won(scale.min + scale.range)
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        MARGIN_LEFT - 5.0,
        CHART_HEIGHT - MARGIN_BOTTOM - 5.0,
        fmt_won(scale.min)
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        MARGIN_LEFT, CHART_HEIGHT - 10.0, first.date
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - 10.0,
        last.date
    ));
    svg.push_str(&format!(
        "  <polyline points=\"{}\" fill=\"none\" stroke=\"#2563eb\" stroke-width=\"2\"/>\n",
        polyline.join(" ")
    ));

    if summary.max_drawdown > 0.0 {
        let marked = summary
            .max_drawdown_date
            .and_then(|date| points.iter().position(|p| p.date == date));
        if let Some(i) = marked {
            let (cx, cy) = (scale.x(i), scale.y(points[i].value));
            svg.push_str(&format!(
                "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"5\" fill=\"red\"/>\n",
                cx, cy
            ));
            svg.push_str(&format!(
                "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"10\" fill=\"red\">MDD -{:.1}% ({})</text>\n",
                cx,
                cy + 18.0,
                summary.max_drawdown * 100.0,
                points[i].date
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}
