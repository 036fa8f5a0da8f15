//! Append-only log of exchanged OCPP messages

pub mod model;
pub mod repository;

pub use model::{Direction, MessageLogEntry};
pub use repository::MessageLogRepository;
