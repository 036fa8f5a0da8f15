//! Inbound ports: interfaces for handling incoming OCPP messages
//!
//! Each OCPP version provides a handler that implements `ProtocolHandler`.
//! The handler is chosen once, at subprotocol negotiation, and serves the
//! connection until it closes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::command::{CommandStatus, CommandType};
use crate::domain::connector::LiveTelemetry;
use crate::domain::OcppVersion;
use crate::support::errors::DomainError;

// ── ProtocolHandler ────────────────────────────────────────────

/// Version-specific behaviour of one station connection.
///
/// Framing and correlation are shared; the handler only deals with action
/// payloads.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Handle a station-initiated Call and produce the CallResult payload.
    async fn handle_call(&self, action: &str, payload: Value) -> Result<Value, ProtocolError>;

    /// The OCPP version this handler speaks.
    fn version(&self) -> OcppVersion;

    /// The station this handler is bound to.
    fn station_id(&self) -> &str;

    /// Wire action for an outbound command.
    fn command_action(&self, command: CommandType) -> &'static str {
        command.action(self.version())
    }

    /// Classify the station's CallResult payload for an outbound command.
    fn answer_status(&self, command: CommandType, payload: &Value) -> CommandStatus;
}

// ── ProtocolHandlerFactory ─────────────────────────────────────

/// Factory for creating per-connection protocol handlers.
///
/// One factory is registered per OCPP version.
pub trait ProtocolHandlerFactory: Send + Sync {
    fn create_handler(
        &self,
        station_id: String,
        live: Arc<LiveTelemetry>,
    ) -> Box<dyn ProtocolHandler>;

    fn version(&self) -> OcppVersion;
}

// ── ProtocolError ──────────────────────────────────────────────

/// Errors raised at the handler boundary, each answered with a CallError.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Action '{0}' is not supported")]
    NotSupported(String),

    #[error("Payload is not valid: {0}")]
    FormationViolation(String),

    #[error("Property constraint violated: {0}")]
    PropertyConstraint(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// OCPP-J error code for the negotiated version.
    pub fn code(&self, version: OcppVersion) -> &'static str {
        match (self, version) {
            (Self::NotSupported(_), _) => "NotSupported",
            (Self::FormationViolation(_), OcppVersion::V16) => "FormationViolation",
            (Self::FormationViolation(_), OcppVersion::V201) => "FormatViolation",
            (Self::PropertyConstraint(_), _) => "PropertyConstraintViolation",
            (Self::ProtocolViolation(_), _) => "ProtocolError",
            (Self::Internal(_), _) => "InternalError",
        }
    }
}

impl From<DomainError> for ProtocolError {
    fn from(e: DomainError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::FormationViolation(e.to_string())
    }
}
