//! CSV panel file adapter.
//!
//! One file holds the whole panel with a header row. Header names are matched
//! case-insensitively; blank cells load as missing values.

use crate::adapters::panel_schema;
use crate::domain::error::KrxQuantError;
use crate::domain::panel::PanelRow;
use crate::ports::data_port::PanelSource;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::PathBuf;

pub struct CsvPanelAdapter {
    path: PathBuf,
}

impl CsvPanelAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Every row in the file, in file order.
    pub fn read_all(&self) -> Result<Vec<PanelRow>, KrxQuantError> {
        let file = File::open(&self.path)?;
        let mut rdr = csv::Reader::from_reader(file);
        let source = self.path.display().to_string();

        let headers = rdr
            .headers()
            .map_err(|e| KrxQuantError::malformed(format!("{source}: {e}")))?
            .clone();
        panel_schema::require_columns(&source, headers.iter())?;

        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (panel_schema::normalize(h), i))
            .collect();
        let column = |name: &str| index.get(&panel_schema::normalize(name)).copied();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record =
                result.map_err(|e| KrxQuantError::malformed(format!("{source}: {e}")))?;
            let cell = |name: &str| column(name).and_then(|i| record.get(i)).unwrap_or("");

            let date = panel_schema::parse_date(cell("Date")).map_err(|e| {
                KrxQuantError::malformed(format!("{source} record {}: {e}", line + 1))
            })?;
            let ticker = cell("Ticker").trim();
            if ticker.is_empty() {
                return Err(KrxQuantError::malformed(format!(
                    "{source} record {}: empty ticker",
                    line + 1
                )));
            }

            let mut row = PanelRow {
                date,
                ticker: ticker.to_string(),
                name: cell("Name").trim().to_string(),
                ..Default::default()
            };
            for &name in panel_schema::ALL_COLUMNS.iter().skip(3) {
                if column(name).is_some() {
                    let value = panel_schema::parse_number(name, cell(name))?;
                    panel_schema::set_numeric(&mut row, name, value);
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl PanelSource for CsvPanelAdapter {
    fn fetch_panel(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PanelRow>, KrxQuantError> {
        let mut rows: Vec<PanelRow> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.date >= start_date && r.date <= end_date)
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        Ok(rows)
    }

    fn list_tickers(&self) -> Result<Vec<String>, KrxQuantError> {
        let tickers: BTreeSet<String> = self.read_all()?.into_iter().map(|r| r.ticker).collect();
        Ok(tickers.into_iter().collect())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxQuantError> {
        let rows = self.read_all()?;
        let min = rows.iter().map(|r| r.date).min();
        let max = rows.iter().map(|r| r.date).max();
        Ok(min.zip(max).map(|(min, max)| (min, max, rows.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "Date,Ticker,Name,Close,ChangeRate,PER,BPS,PBR,EPS,DIV,MarketCap";

    fn setup_panel(body: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(&path, format!("{HEADER}\n{body}")).unwrap();
        (dir, path)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn read_all_parses_rows() {
        let (_dir, path) = setup_panel(
            "2024-01-31,005930,Samsung,74000,1.5,12.3,50000,1.48,6000,1.9,4.4e14\n",
        );
        let rows = CsvPanelAdapter::new(path).read_all().unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.date, d(2024, 1, 31));
        assert_eq!(row.ticker, "005930");
        assert_eq!(row.name, "Samsung");
        assert_eq!(row.close, Some(74000.0));
        assert_eq!(row.per, Some(12.3));
        assert_eq!(row.market_cap, Some(4.4e14));
        assert_eq!(row.open, None);
    }

    #[test]
    fn blank_cells_are_missing() {
        let (_dir, path) = setup_panel("2024-01-31,000660,SK Hynix,130000,,,,,,,\n");
        let rows = CsvPanelAdapter::new(path).read_all().unwrap();
        assert_eq!(rows[0].per, None);
        assert_eq!(rows[0].change_rate, None);
        assert_eq!(rows[0].close, Some(130000.0));
    }

    #[test]
    fn headers_match_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(
            &path,
            "date,ticker,name,close,change_rate,per,bps,pbr,eps,div\n\
             2024-01-31 00:00:00,A,Alpha,100,0.5,10,1000,1,100,2\n",
        )
        .unwrap();
        let rows = CsvPanelAdapter::new(path).read_all().unwrap();
        assert_eq!(rows[0].date, d(2024, 1, 31));
        assert_eq!(rows[0].change_rate, Some(0.5));
    }

    #[test]
    fn missing_required_header_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(&path, "Date,Ticker,Name,Close\n2024-01-31,A,Alpha,100\n").unwrap();
        let err = CsvPanelAdapter::new(path).read_all().unwrap_err();
        assert!(
            matches!(err, KrxQuantError::MalformedInput { reason } if reason.contains("PER"))
        );
    }

    #[test]
    fn bad_number_is_malformed() {
        let (_dir, path) = setup_panel("2024-01-31,A,Alpha,abc,,,,,,,\n");
        let err = CsvPanelAdapter::new(path).read_all().unwrap_err();
        assert!(matches!(err, KrxQuantError::MalformedInput { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CsvPanelAdapter::new(PathBuf::from("/nonexistent/panel.csv"))
            .read_all()
            .unwrap_err();
        assert!(matches!(err, KrxQuantError::Io(_)));
    }

    #[test]
    fn fetch_panel_filters_and_sorts() {
        let (_dir, path) = setup_panel(
            "2024-02-29,B,Beta,10,,,,,,,\n\
             2024-01-31,B,Beta,10,,,,,,,\n\
             2024-01-31,A,Alpha,10,,,,,,,\n\
             2024-03-29,A,Alpha,10,,,,,,,\n",
        );
        let adapter = CsvPanelAdapter::new(path);
        let rows = adapter.fetch_panel(d(2024, 1, 1), d(2024, 2, 29)).unwrap();
        let keys: Vec<_> = rows.iter().map(|r| (r.date, r.ticker.as_str())).collect();
        assert_eq!(
            keys,
            vec![(d(2024, 1, 31), "A"), (d(2024, 1, 31), "B"), (d(2024, 2, 29), "B")]
        );
    }

    #[test]
    fn list_tickers_and_range() {
        let (_dir, path) = setup_panel(
            "2024-02-29,B,Beta,10,,,,,,,\n\
             2024-01-31,A,Alpha,10,,,,,,,\n",
        );
        let adapter = CsvPanelAdapter::new(path);
        assert_eq!(adapter.list_tickers().unwrap(), vec!["A", "B"]);
        assert_eq!(
            adapter.get_data_range().unwrap(),
            Some((d(2024, 1, 31), d(2024, 2, 29), 2))
        );
    }

    #[test]
    fn empty_file_has_no_range() {
        let (_dir, path) = setup_panel("");
        assert_eq!(CsvPanelAdapter::new(path).get_data_range().unwrap(), None);
    }
}
