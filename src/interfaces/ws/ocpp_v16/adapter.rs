//! OCPP 1.6 handler factory
//!
//! Holds the shared application services every per-connection
//! `OcppHandlerV16` needs.

use std::sync::Arc;

use crate::application::handlers::{ChargingServices, OcppHandlerV16};
use crate::domain::{LiveTelemetry, OcppVersion, ProtocolHandler, ProtocolHandlerFactory};

pub struct V16AdapterFactory {
    services: Arc<ChargingServices>,
}

impl V16AdapterFactory {
    pub fn new(services: Arc<ChargingServices>) -> Self {
        Self { services }
    }
}

impl ProtocolHandlerFactory for V16AdapterFactory {
    fn create_handler(&self, station_id: String, live: Arc<LiveTelemetry>) -> Box<dyn ProtocolHandler> {
        Box::new(OcppHandlerV16::new(station_id, self.services.clone(), live))
    }

    fn version(&self) -> OcppVersion {
        OcppVersion::V16
    }
}
