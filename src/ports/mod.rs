//! Port traits at the I/O seams of the engine.

pub mod config_port;
pub mod data_port;
pub mod event_port;
pub mod report_port;
