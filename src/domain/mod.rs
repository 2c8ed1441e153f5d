//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod event;
pub mod execution;
pub mod metrics;
pub mod panel;
pub mod portfolio;
pub mod selection;
pub mod strategy;
pub mod universe;
