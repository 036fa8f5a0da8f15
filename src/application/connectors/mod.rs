//! Connector status and telemetry tracking

mod tracker;
pub mod units;

pub use tracker::ConnectorTracker;
pub use units::{MeterSnapshot, RawSample};
