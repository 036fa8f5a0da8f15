//! OCPP 2.0.1 handler factory
//!
//! Holds the shared application services every per-connection
//! `OcppHandlerV201` needs.

use std::sync::Arc;

use crate::application::handlers::{ChargingServices, OcppHandlerV201};
use crate::domain::{LiveTelemetry, OcppVersion, ProtocolHandler, ProtocolHandlerFactory};

pub struct V201AdapterFactory {
    services: Arc<ChargingServices>,
}

impl V201AdapterFactory {
    pub fn new(services: Arc<ChargingServices>) -> Self {
        Self { services }
    }
}

impl ProtocolHandlerFactory for V201AdapterFactory {
    fn create_handler(&self, station_id: String, live: Arc<LiveTelemetry>) -> Box<dyn ProtocolHandler> {
        Box::new(OcppHandlerV201::new(station_id, self.services.clone(), live))
    }

    fn version(&self) -> OcppVersion {
        OcppVersion::V201
    }
}
