//! WebSocket interfaces
//!
//! - `ocpp_server`: Unified OCPP WebSocket server (multi-version)
//! - `session`: per-connection read/dispatch/write loop
//! - `negotiator`: Protocol version negotiation and adapter registry
//! - `auth`: station authentication after the upgrade
//! - `ocpp_v16` / `ocpp_v201`: protocol adapters

pub mod auth;
pub mod negotiator;
pub mod ocpp_server;
pub mod ocpp_v16;
pub mod ocpp_v201;
pub mod session;

pub use auth::{AuthError, HandshakeCredentials, StationAuthenticator};
pub use negotiator::{ProtocolAdapters, ProtocolNegotiator};
pub use ocpp_server::{OcppServer, OcppServerConfig};
pub use ocpp_v16::V16AdapterFactory;
pub use ocpp_v201::V201AdapterFactory;
pub use session::{Session, SessionServices};
