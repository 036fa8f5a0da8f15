//! Outbound commands
//!
//! Commands are queued in storage, drained by the station's session loop,
//! correlated by uniqueId and completed from the station's answer.

mod completion;
mod correlator;
mod dispatcher;
mod drainer;
mod payloads;
mod status_map;

use thiserror::Error;

use crate::support::errors::DomainError;

pub use completion::CommandCompletion;
pub use correlator::{Answer, Correlator, DuplicateCorrelation, PendingCorrelation};
pub use dispatcher::{CommandDispatcher, CommandRequest};
pub use drainer::CommandDrainer;
pub use payloads::wire_payload;
pub use status_map::answer_status;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Charge point not connected: {0}")]
    NotConnected(String),

    #[error("Failed to send: {0}")]
    SendFailed(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Response channel closed")]
    ChannelClosed,

    #[error("CallError {code}: {description}")]
    CallError { code: String, description: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),
}

impl From<DomainError> for CommandError {
    fn from(e: DomainError) -> Self {
        Self::Storage(e.to_string())
    }
}
