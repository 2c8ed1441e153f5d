//! SQLite panel store adapter (`stock_monthly_data`).

use crate::adapters::panel_schema::{self, ALL_COLUMNS, TABLE};
use crate::domain::error::KrxQuantError;
use crate::domain::panel::PanelRow;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PanelSource;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rusqlite::types::Value;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_error(e: r2d2::Error) -> KrxQuantError {
    KrxQuantError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> KrxQuantError {
    KrxQuantError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

fn value_to_number(column: &str, value: Value) -> Result<Option<f64>, KrxQuantError> {
    match value {
        Value::Real(f) => Ok(Some(f).filter(|f| f.is_finite())),
        Value::Integer(i) => Ok(Some(i as f64)),
        Value::Text(s) => panel_schema::parse_number(column, &s),
        Value::Null | Value::Blob(_) => Ok(None),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, KrxQuantError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| KrxQuantError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).clamp(1, 64) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, KrxQuantError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(db_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, KrxQuantError> {
        self.pool.get().map_err(db_error)
    }

    pub fn initialize_schema(&self) -> Result<(), KrxQuantError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS stock_monthly_data (
                    Date TEXT NOT NULL,
                    Ticker TEXT NOT NULL,
                    Name TEXT,
                    Open REAL,
                    High REAL,
                    Low REAL,
                    Close REAL,
                    Volume REAL,
                    ChangeRate REAL,
                    PER REAL,
                    BPS REAL,
                    PBR REAL,
                    EPS REAL,
                    DPS REAL,
                    DIV REAL,
                    MarketCap REAL,
                    SharesOutstanding REAL,
                    DebtRatio REAL,
                    DividendYield REAL,
                    PRIMARY KEY (Date, Ticker)
                );
                CREATE INDEX IF NOT EXISTS idx_stock_monthly_ticker ON stock_monthly_data(Ticker);",
            )
            .map_err(query_error)
    }

    /// Column names of the panel table, in table order.
    pub fn table_columns(&self) -> Result<Vec<String>, KrxQuantError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({TABLE})"))
            .map_err(query_error)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        if names.is_empty() {
            return Err(KrxQuantError::malformed(format!("table {TABLE} does not exist")));
        }
        Ok(names)
    }

    /// Known panel columns present in the table, in canonical spelling. Fails
    /// when a required column is missing.
    fn panel_columns(&self) -> Result<Vec<&'static str>, KrxQuantError> {
        let present = self.table_columns()?;
        panel_schema::require_columns(TABLE, present.iter().map(String::as_str))?;
        let present: Vec<String> = present.iter().map(|c| panel_schema::normalize(c)).collect();
        Ok(ALL_COLUMNS
            .iter()
            .copied()
            .filter(|c| present.contains(&panel_schema::normalize(c)))
            .collect())
    }

    /// Upsert `rows` in one transaction. Returns the number written.
    pub fn insert_rows(&self, rows: &[PanelRow]) -> Result<usize, KrxQuantError> {
        let columns = self.panel_columns()?;
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {TABLE} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        {
            let mut stmt = tx.prepare(&sql).map_err(query_error)?;
            for row in rows {
                let values = columns.iter().map(|&col| match col {
                    "Date" => Value::Text(panel_schema::format_date(row.date)),
                    "Ticker" => Value::Text(row.ticker.clone()),
                    "Name" => Value::Text(row.name.clone()),
                    _ => panel_schema::numeric(row, col).map_or(Value::Null, Value::Real),
                });
                stmt.execute(rusqlite::params_from_iter(values))
                    .map_err(query_error)?;
            }
        }
        tx.commit().map_err(query_error)?;
        Ok(rows.len())
    }

    pub fn row_count(&self) -> Result<usize, KrxQuantError> {
        let count: i64 = self
            .conn()?
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))
            .map_err(query_error)?;
        Ok(count as usize)
    }
}

impl PanelSource for SqliteAdapter {
    fn fetch_panel(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PanelRow>, KrxQuantError> {
        let columns = self.panel_columns()?;
        let query = format!(
            "SELECT {} FROM {TABLE}
             WHERE substr(Date, 1, 10) >= ?1 AND substr(Date, 1, 10) <= ?2
             ORDER BY Date ASC, Ticker ASC",
            columns.join(", ")
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let raw = stmt
            .query_map(
                params![
                    panel_schema::format_date(start_date),
                    panel_schema::format_date(end_date)
                ],
                |row| {
                    (0..columns.len())
                        .map(|i| row.get::<_, Value>(i))
                        .collect::<Result<Vec<Value>, _>>()
                },
            )
            .map_err(query_error)?;

        let mut rows = Vec::new();
        for values in raw {
            let values = values.map_err(query_error)?;
            let mut row = PanelRow::default();
            for (&col, value) in columns.iter().zip(values) {
                match col {
                    "Date" => {
                        let text = value_to_text(value)
                            .ok_or_else(|| KrxQuantError::malformed("NULL Date in panel table"))?;
                        row.date = panel_schema::parse_date(&text)?;
                    }
                    "Ticker" => {
                        row.ticker = value_to_text(value)
                            .ok_or_else(|| KrxQuantError::malformed("NULL Ticker in panel table"))?;
                    }
                    "Name" => row.name = value_to_text(value).unwrap_or_default(),
                    _ => panel_schema::set_numeric(&mut row, col, value_to_number(col, value)?),
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn list_tickers(&self) -> Result<Vec<String>, KrxQuantError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT DISTINCT Ticker FROM {TABLE} ORDER BY Ticker"))
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, Value>(0))
            .map_err(query_error)?;

        let mut tickers = Vec::new();
        for row in rows {
            if let Some(ticker) = value_to_text(row.map_err(query_error)?) {
                tickers.push(ticker);
            }
        }
        Ok(tickers)
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxQuantError> {
        let query = format!("SELECT MIN(Date), MAX(Date), COUNT(*) FROM {TABLE}");
        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(&query, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => Ok(Some((
                panel_schema::parse_date(&min)?,
                panel_schema::parse_date(&max)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}
