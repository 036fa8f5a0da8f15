//! Transaction aggregate
//!
//! Contains the Transaction entity, related types, and repository interface.

pub mod model;
pub mod repository;

pub use model::{NewTransaction, Transaction, TransactionStatus, TransactionStop};
pub use repository::TransactionRepository;
