//! Outbound command aggregate
//!
//! Administrator-queued instructions for a station, delivered over the
//! station's own socket.

pub mod model;
pub mod repository;

pub use model::{CommandStatus, CommandType, NewCommand, OutboundCommand};
pub use repository::CommandRepository;
