//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod panel_schema;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod svg_chart;
pub mod tracing_sink;
