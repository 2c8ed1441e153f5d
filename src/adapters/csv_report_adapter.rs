//! CSV report adapter: one row per rebalance record.

use crate::adapters::panel_schema::format_date;
use crate::domain::error::KrxQuantError;
use crate::domain::portfolio::RebalanceRecord;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct RecordRow<'a> {
    strategy: &'static str,
    date: String,
    valuation_date: String,
    value: f64,
    period_return: Option<f64>,
    drawdown: f64,
    cash_only: bool,
    selected_count: usize,
    selected: &'a str,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    /// Render the records to CSV text, header included.
    pub fn render(records: &[RebalanceRecord], strategy: &Strategy) -> Result<String, KrxQuantError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in records {
            let selected = record.selected.join(";");
            wtr.serialize(RecordRow {
                strategy: strategy.name(),
                date: format_date(record.date),
                valuation_date: format_date(record.valuation_date),
                value: record.value,
                period_return: record.period_return,
                drawdown: record.drawdown,
                cash_only: record.cash_only,
                selected_count: record.selected.len(),
                selected: &selected,
            })
            .map_err(|e| KrxQuantError::Io(e.into()))?;
        }
        let data = wtr
            .into_inner()
            .map_err(|e| KrxQuantError::Io(e.into_error()))?;
        String::from_utf8(data).map_err(|e| KrxQuantError::malformed(e.to_string()))
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        records: &[RebalanceRecord],
        strategy: &Strategy,
        output_path: &str,
    ) -> Result<(), KrxQuantError> {
        let content = Self::render(records, strategy)?;
        std::fs::write(output_path, content)?;
        Ok(())
    }
}
