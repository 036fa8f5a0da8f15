//! Connection registry and per-connection state

pub mod connection;
pub mod registry;

use thiserror::Error;

pub use connection::Connection;
pub use registry::{SessionRegistry, SharedSessionRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Station {0} is not connected")]
    NotConnected(String),

    #[error("Station {0} already has an open session")]
    AlreadyConnected(String),

    #[error("Connection to {0} is closed")]
    Closed(String),
}
