//! Application layer: authorization, transactions, commands and sessions

pub mod authorization;
pub mod commands;
pub mod connectors;
pub mod handlers;
pub mod message_log;
pub mod session;
pub mod transactions;

pub use authorization::{AuthorizationReply, TagResolver};
pub use commands::{
    CommandCompletion, CommandDispatcher, CommandDrainer, CommandError, CommandRequest, Correlator,
};
pub use connectors::ConnectorTracker;
pub use handlers::{ChargingServices, OcppHandlerV16, OcppHandlerV201};
pub use message_log::MessageLogger;
pub use session::{Connection, SessionError, SessionRegistry, SharedSessionRegistry};
pub use transactions::TransactionService;
