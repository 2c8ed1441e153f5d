//! Report generation port.

use crate::domain::error::KrxQuantError;
use crate::domain::portfolio::RebalanceRecord;
use crate::domain::strategy::Strategy;

/// Port for writing per-period backtest output.
pub trait ReportPort {
    fn write(
        &self,
        records: &[RebalanceRecord],
        strategy: &Strategy,
        output_path: &str,
    ) -> Result<(), KrxQuantError>;
}
