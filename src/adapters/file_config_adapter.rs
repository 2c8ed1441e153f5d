//! INI file configuration adapter.
//!
//! `configparser` lowercases section and key names, so lookups are
//! case-insensitive. A key written with a blank value reads as missing.

use crate::domain::error::KrxQuantError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    ini: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KrxQuantError> {
        let path = path.as_ref();
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|reason| parse_error(&path.display().to_string(), reason))?;
        Ok(Self { ini })
    }

    pub fn from_string(content: &str) -> Result<Self, KrxQuantError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| parse_error("<string>", reason))?;
        Ok(Self { ini })
    }
}

fn parse_error(file: &str, reason: String) -> KrxQuantError {
    KrxQuantError::ConfigParse {
        file: file.to_string(),
        reason,
    }
}

/// Typed `configparser` lookups fail on unparsable text; both that and a
/// missing key fall back to `default`.
fn or_default<T>(lookup: Result<Option<T>, String>, default: T) -> T {
    lookup.ok().flatten().unwrap_or(default)
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get(section, key)
            .filter(|value| !value.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        or_default(self.ini.getint(section, key), default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        or_default(self.ini.getfloat(section, key), default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        or_default(self.ini.getboolcoerce(section, key), default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[sqlite]
path = data/krx_stock_data.db

[strategy]
name = low_per_high_div
max_stocks = 20
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("data/krx_stock_data.db".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("low_per_high_div".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "max_stocks", 0), 20);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn blank_value_reads_as_missing() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nstart_date =\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "start_date"), None);
    }

    #[test]
    fn lookups_ignore_case() {
        let adapter = FileConfigAdapter::from_string("[Strategy]\nMax_Stocks = 7\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "max_stocks", 20), 7);
    }

    #[test]
    fn get_int_falls_back_on_missing_or_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nmax_stocks = abc\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "max_stocks", 20), 20);
        assert_eq!(adapter.get_int("strategy", "momentum_window", 12), 12);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nbuy_fee = 0.00015\n").unwrap();
        assert_eq!(adapter.get_double("backtest", "buy_fee", 0.0), 0.00015);
    }

    #[test]
    fn get_double_falls_back_on_missing_or_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = lots\n").unwrap();
        assert_eq!(
            adapter.get_double("backtest", "initial_capital", 10_000_000.0),
            10_000_000.0
        );
        assert_eq!(adapter.get_double("backtest", "risk_free_rate", 0.03), 0.03);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[filter]\na = true\nb = yes\nc = 1\nd = off\ne = No\n",
        )
        .unwrap();
        assert!(adapter.get_bool("filter", "a", false));
        assert!(adapter.get_bool("filter", "b", false));
        assert!(adapter.get_bool("filter", "c", false));
        assert!(!adapter.get_bool("filter", "d", true));
        assert!(!adapter.get_bool("filter", "e", true));
        assert!(adapter.get_bool("filter", "missing", true));
    }

    #[test]
    fn get_bool_falls_back_on_unrecognised_text() {
        let adapter = FileConfigAdapter::from_string("[filter]\ntrim_pbr = maybe\n").unwrap();
        assert!(!adapter.get_bool("filter", "trim_pbr", false));
        assert!(adapter.get_bool("filter", "trim_pbr", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[logging]\nlevel = debug\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("logging", "level"), Some("debug".to_string()));
    }

    #[test]
    fn from_file_reports_missing_file_as_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(
            matches!(result, Err(KrxQuantError::ConfigParse { file, .. }) if file.contains("config.ini"))
        );
    }
}
