//! Sink port for engine decisions and data-gap warnings.

use crate::domain::event::BacktestEvent;

pub trait EventSink {
    fn on_event(&self, event: &BacktestEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &BacktestEvent) {}
}
