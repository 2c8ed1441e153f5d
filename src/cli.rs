//! CLI definition and dispatch.

use chrono::{Months, NaiveDate};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart;
use crate::adapters::tracing_sink::TracingSink;
use crate::domain::backtest::{
    self as backtest_engine, BacktestConfig, BacktestResult, DEFAULT_INITIAL_CAPITAL,
    DEFAULT_PERIODS_PER_YEAR, DEFAULT_RISK_FREE_RATE,
};
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_filter_config, validate_strategy_config,
};
use crate::domain::error::KrxQuantError;
use crate::domain::execution::CostModel;
use crate::domain::metrics::{PerformanceSummary, format_percent, format_ratio};
use crate::domain::panel::Panel;
use crate::domain::strategy::{
    DEFAULT_MAX_STOCKS, DEFAULT_MOMENTUM_WINDOW, DEFAULT_TOP_FRACTION, Strategy,
};
use crate::domain::universe::{DEFAULT_LOWER_PCT, DEFAULT_UPPER_PCT, FilterRules};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PanelSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "krxquant", about = "Monthly factor backtester for Korean equities")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy name, overriding [strategy] name
        #[arg(short, long)]
        strategy: Option<String>,
        /// Per-period records as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Portfolio value chart as SVG
        #[arg(long)]
        chart: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the date range and ticker count of the panel store
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load a CSV panel file into the panel store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
            chart,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, strategy.as_deref())
            } else {
                run_backtest(
                    &config,
                    strategy.as_deref(),
                    output.as_deref(),
                    chart.as_deref(),
                )
            }
        }
        Command::Info { config } => run_info(&config),
        Command::Import { config, csv } => run_import(&config, &csv),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Install the stderr subscriber. `RUST_LOG` wins over `[logging] level`.
pub fn init_logging(config: &dyn ConfigPort) {
    let level = config
        .get_string("logging", "level")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when several runs share a process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn validate_all(config: &dyn ConfigPort, strategy: Option<&str>) -> Result<(), KrxQuantError> {
    validate_backtest_config(config)?;
    validate_filter_config(config)?;
    validate_strategy_config(config, strategy)
}

fn run_backtest(
    config_path: &Path,
    strategy_override: Option<&str>,
    output_path: Option<&Path>,
    chart_path: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(&adapter);

    if let Err(e) = validate_all(&adapter, strategy_override) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let strategy = match build_strategy(&adapter, strategy_override) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Strategy: {strategy}");

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        run_backtest_pipeline(&store, &strategy, &bt_config, output_path, chart_path)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (&strategy, &bt_config, output_path, chart_path);
        eprintln!("error: sqlite feature is required for backtest");
        ExitCode::from(1)
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, KrxQuantError> {
    let start_date = parse_date(adapter, "start_date")?;
    let end_date = parse_date(adapter, "end_date")?;
    let periods_per_year = adapter.get_int(
        "backtest",
        "periods_per_year",
        i64::from(DEFAULT_PERIODS_PER_YEAR),
    );

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_capital: adapter.get_double(
            "backtest",
            "initial_capital",
            DEFAULT_INITIAL_CAPITAL,
        ),
        cost: CostModel {
            buy_slippage: adapter.get_double("backtest", "buy_slippage", 0.0),
            buy_fee: adapter.get_double("backtest", "buy_fee", 0.0),
            sell_slippage: adapter.get_double("backtest", "sell_slippage", 0.0),
            sell_fee: adapter.get_double("backtest", "sell_fee", 0.0),
        },
        filter: FilterRules {
            lower_pct: adapter.get_double("filter", "lower_pct", DEFAULT_LOWER_PCT),
            upper_pct: adapter.get_double("filter", "upper_pct", DEFAULT_UPPER_PCT),
            trim_pbr: adapter.get_bool("filter", "trim_pbr", false),
            ..FilterRules::default()
        },
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE),
        periods_per_year: u32::try_from(periods_per_year).map_err(|_| {
            KrxQuantError::ConfigInvalid {
                section: "backtest".into(),
                key: "periods_per_year".into(),
                reason: format!("{periods_per_year} is out of range"),
            }
        })?,
    })
}

fn positive_count(
    adapter: &dyn ConfigPort,
    key: &str,
    default: usize,
) -> Result<usize, KrxQuantError> {
    let value = adapter.get_int("strategy", key, default as i64);
    usize::try_from(value)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| KrxQuantError::ConfigInvalid {
            section: "strategy".into(),
            key: key.into(),
            reason: format!("{key} must be at least 1"),
        })
}

/// Resolve the strategy variant and fill in its parameters from `[strategy]`.
pub fn build_strategy(
    adapter: &dyn ConfigPort,
    name_override: Option<&str>,
) -> Result<Strategy, KrxQuantError> {
    let name = match name_override {
        Some(name) => name.to_string(),
        None => adapter
            .get_string("strategy", "name")
            .ok_or_else(|| KrxQuantError::ConfigMissing {
                section: "strategy".into(),
                key: "name".into(),
            })?,
    };
    let base = name
        .parse::<Strategy>()
        .map_err(|e| KrxQuantError::ConfigInvalid {
            section: "strategy".into(),
            key: "name".into(),
            reason: e.to_string(),
        })?;

    let max_stocks = positive_count(adapter, "max_stocks", DEFAULT_MAX_STOCKS)?;
    Ok(match base {
        Strategy::LowestPer { .. } => Strategy::LowestPer { max_stocks },
        Strategy::LowPerHighDiv { .. } => Strategy::LowPerHighDiv { max_stocks },
        Strategy::SmallValue { .. } => Strategy::SmallValue { max_stocks },
        Strategy::CombinedScore { .. } => Strategy::CombinedScore {
            max_stocks,
            momentum_window: positive_count(adapter, "momentum_window", DEFAULT_MOMENTUM_WINDOW)?,
        },
        Strategy::QualityValue { .. } => Strategy::QualityValue {
            top_fraction: adapter.get_double("strategy", "top_fraction", DEFAULT_TOP_FRACTION),
        },
    })
}

/// First date to load so trailing windows are full on the first rebalance.
pub fn history_start(strategy: &Strategy, start_date: NaiveDate) -> NaiveDate {
    match strategy {
        Strategy::CombinedScore {
            momentum_window, ..
        } => u32::try_from(*momentum_window)
            .ok()
            .and_then(|months| start_date.checked_sub_months(Months::new(months + 1)))
            .unwrap_or(start_date),
        _ => start_date,
    }
}

pub fn format_summary(
    strategy: &Strategy,
    result: &BacktestResult,
    summary: &PerformanceSummary,
) -> String {
    let mdd_date = summary
        .max_drawdown_date
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", strategy.name()));
    out.push_str(&format!("Periods:          {}\n", summary.periods));
    out.push_str(&format!("Cash-only:        {}\n", result.cash_only_periods()));
    out.push_str(&format!("Data gaps:        {}\n", result.gap_count));
    out.push_str(&format!("Initial capital:  {:.0}\n", summary.initial_capital));
    out.push_str(&format!("Final value:      {:.0}\n", summary.final_value));
    out.push_str(&format!(
        "Total return:     {}\n",
        format_percent(&summary.total_return)
    ));
    out.push_str(&format!(
        "Max drawdown:     -{:.2}% ({})\n",
        summary.max_drawdown * 100.0,
        mdd_date
    ));
    out.push_str(&format!("CAGR:             {}\n", format_percent(&summary.cagr)));
    out.push_str(&format!("Sharpe ratio:     {}\n", format_ratio(&summary.sharpe)));
    out
}

pub fn run_backtest_pipeline(
    source: &dyn PanelSource,
    strategy: &Strategy,
    bt_config: &BacktestConfig,
    output_path: Option<&Path>,
    chart_path: Option<&Path>,
) -> ExitCode {
    let load_from = history_start(strategy, bt_config.start_date);
    let rows = match source.fetch_panel(load_from, bt_config.end_date) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let panel = match Panel::new(rows) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Running backtest: {} rows, {} to {}",
        panel.row_count(),
        bt_config.start_date,
        bt_config.end_date
    );

    let result = match backtest_engine::run_backtest(&panel, bt_config, strategy, &TracingSink) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let summary = PerformanceSummary::compute(
        &result,
        bt_config.risk_free_rate,
        bt_config.periods_per_year,
    );

    print!("{}", format_summary(strategy, &result, &summary));

    if let Some(path) = output_path {
        if let Err(e) = CsvReportAdapter.write(&result.records, strategy, &path.to_string_lossy()) {
            eprintln!("error: failed to write records: {e}");
            return (&e).into();
        }
        eprintln!("Records written to: {}", path.display());
    }

    if let Some(path) = chart_path {
        let svg = svg_chart::render_value_chart(&result.records, &summary);
        if let Err(e) = fs::write(path, svg) {
            eprintln!("error: failed to write chart: {e}");
            return ExitCode::from(1);
        }
        eprintln!("Chart written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

pub fn run_dry_run(config_path: &Path, strategy_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter, strategy_override) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let (strategy, bt_config) = match build_strategy(&adapter, strategy_override)
        .and_then(|s| build_backtest_config(&adapter).map(|c| (s, c)))
    {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Config validated successfully");

    eprintln!("\nStrategy: {strategy}");
    eprintln!("\nBacktest:");
    eprintln!("  range:           {} to {}", bt_config.start_date, bt_config.end_date);
    eprintln!("  initial capital: {:.0}", bt_config.initial_capital);
    eprintln!(
        "  buy:             slippage {}, fee {}",
        bt_config.cost.buy_slippage, bt_config.cost.buy_fee
    );
    eprintln!(
        "  sell:            slippage {}, fee {}",
        bt_config.cost.sell_slippage, bt_config.cost.sell_fee
    );
    eprintln!(
        "  filter:          {}..{} percentile, trim PBR {}",
        bt_config.filter.lower_pct, bt_config.filter.upper_pct, bt_config.filter.trim_pbr
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        print_info(&store)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}

pub fn print_info(source: &dyn PanelSource) -> ExitCode {
    let range = match source.get_data_range() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    match range {
        Some((first, last, count)) => {
            let tickers = match source.list_tickers() {
                Ok(t) => t.len(),
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            println!("{count} rows, {tickers} tickers, {first} to {last}");
        }
        None => eprintln!("No panel data found"),
    }
    ExitCode::SUCCESS
}

fn run_import(config_path: &Path, csv_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(&config);

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::CsvPanelAdapter;
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        eprintln!("Reading {}", csv_path.display());
        let rows = match CsvPanelAdapter::new(csv_path.to_path_buf()).read_all() {
            Ok(rows) => rows,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let outcome = SqliteAdapter::from_config(&config).and_then(|store| {
            store.initialize_schema()?;
            store.insert_rows(&rows)
        });
        match outcome {
            Ok(n) => {
                eprintln!("Imported {n} rows");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, csv_path);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn history_start_reaches_back_for_momentum() {
        let start = NaiveDate::from_ymd_opt(2020, 6, 30).unwrap();
        let combined = Strategy::CombinedScore {
            max_stocks: 20,
            momentum_window: 12,
        };
        assert_eq!(
            history_start(&combined, start),
            NaiveDate::from_ymd_opt(2019, 5, 30).unwrap()
        );
        assert_eq!(
            history_start(&Strategy::LowestPer { max_stocks: 20 }, start),
            start
        );
    }

    #[test]
    fn build_strategy_uses_override() {
        let adapter = config("[strategy]\nname = lowest_per\nmax_stocks = 7\n");
        let strategy = build_strategy(&adapter, Some("small_value")).unwrap();
        assert_eq!(strategy, Strategy::SmallValue { max_stocks: 7 });
    }

    #[test]
    fn build_strategy_rejects_zero_max_stocks() {
        let adapter = config("[strategy]\nname = lowest_per\nmax_stocks = 0\n");
        assert!(matches!(
            build_strategy(&adapter, None),
            Err(KrxQuantError::ConfigInvalid { key, .. }) if key == "max_stocks"
        ));
    }

    #[test]
    fn cli_parses_backtest_arguments() {
        let cli = Cli::try_parse_from([
            "krxquant",
            "backtest",
            "-c",
            "cfg.ini",
            "--strategy",
            "quality_value",
            "--chart",
            "value.svg",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                strategy,
                chart,
                output,
                dry_run,
            } => {
                assert_eq!(config, PathBuf::from("cfg.ini"));
                assert_eq!(strategy.as_deref(), Some("quality_value"));
                assert_eq!(chart, Some(PathBuf::from("value.svg")));
                assert_eq!(output, None);
                assert!(!dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_import() {
        let cli =
            Cli::try_parse_from(["krxquant", "import", "-c", "cfg.ini", "--csv", "panel.csv"])
                .unwrap();
        assert!(matches!(cli.command, Command::Import { .. }));
    }
}
