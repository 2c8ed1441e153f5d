//! Panel data access port.

use crate::domain::error::KrxQuantError;
use crate::domain::panel::PanelRow;
use chrono::NaiveDate;

/// Read-only source of monthly panel rows.
pub trait PanelSource {
    /// All rows with `start <= date <= end`, sorted by (date, ticker).
    fn fetch_panel(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PanelRow>, KrxQuantError>;

    fn list_tickers(&self) -> Result<Vec<String>, KrxQuantError>;

    /// First date, last date and row count, or `None` for an empty store.
    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxQuantError>;
}
