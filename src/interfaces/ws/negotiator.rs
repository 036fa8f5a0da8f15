//! OCPP protocol version negotiation
//!
//! During the WebSocket handshake the station offers the OCPP subprotocols
//! it speaks in `Sec-WebSocket-Protocol`. The negotiator picks the first
//! version in server preference order that the station offered and echoes
//! the offered token back.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::{LiveTelemetry, OcppVersion, ProtocolHandler, ProtocolHandlerFactory};

// ── ProtocolNegotiator ─────────────────────────────────────────

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub version: OcppVersion,
    /// Token to echo in the response, exactly as the station offered it
    pub token: &'static str,
}

pub struct ProtocolNegotiator {
    /// Versions the server supports, newest first.
    supported_versions: Vec<OcppVersion>,
}

impl ProtocolNegotiator {
    pub fn new(supported_versions: Vec<OcppVersion>) -> Self {
        Self { supported_versions }
    }

    /// Negotiate from the `Sec-WebSocket-Protocol` header value.
    ///
    /// `ocpp2.0.1` is preferred over `ocpp2.0`, both over `ocpp1.6`.
    pub fn negotiate(&self, requested_protocols: &str) -> Option<Negotiated> {
        let requested: Vec<&str> = requested_protocols
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        for version in &self.supported_versions {
            for token in version.subprotocols() {
                if requested.iter().any(|p| p.eq_ignore_ascii_case(token)) {
                    return Some(Negotiated {
                        version: *version,
                        token: *token,
                    });
                }
            }
        }
        None
    }

    pub fn supported_subprotocols(&self) -> Vec<&'static str> {
        self.supported_versions
            .iter()
            .flat_map(|v| v.subprotocols().iter().copied())
            .collect()
    }
}

// ── ProtocolAdapters ───────────────────────────────────────────

/// Registry that maps OCPP versions to their handler factories.
///
/// The server looks up the negotiated version here to create the
/// per-connection handler.
pub struct ProtocolAdapters {
    factories: HashMap<OcppVersion, Arc<dyn ProtocolHandlerFactory>>,
}

impl ProtocolAdapters {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn ProtocolHandlerFactory>) {
        let version = factory.version();
        info!(%version, "Registered protocol handler");
        self.factories.insert(version, factory);
    }

    pub fn create_handler(
        &self,
        version: OcppVersion,
        station_id: String,
        live: Arc<LiveTelemetry>,
    ) -> Option<Box<dyn ProtocolHandler>> {
        self.factories
            .get(&version)
            .map(|f| f.create_handler(station_id, live))
    }

    /// Registered versions in server preference order.
    pub fn supported_versions(&self) -> Vec<OcppVersion> {
        OcppVersion::ALL
            .iter()
            .copied()
            .filter(|v| self.factories.contains_key(v))
            .collect()
    }

    pub fn build_negotiator(&self) -> ProtocolNegotiator {
        ProtocolNegotiator::new(self.supported_versions())
    }
}

impl Default for ProtocolAdapters {
    fn default() -> Self {
        Self::new()
    }
}
