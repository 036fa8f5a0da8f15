//! Connector aggregate

pub mod live;
pub mod model;
pub mod repository;

pub use live::LiveTelemetry;
pub use model::{Connector, ConnectorUpdate, LiveConnectorMetrics};
pub use repository::ConnectorRepository;
