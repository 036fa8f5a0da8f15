//! Transaction state machine

mod service;

pub use service::{StartOutcome, StartRequest, StopOutcome, StopRequest, TransactionService};
