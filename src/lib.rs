//! # OCPP Central System protocol engine
//!
//! OCPP 1.6 and 2.0.1 central system for EV charging stations.
//!
//! ## Architecture
//!
//! - **domain**: Core entities, status enums, repository traits and the
//!   per-version protocol port
//! - **application**: Authorization, transactions, connector tracking,
//!   outbound commands and the per-version action handlers
//! - **infrastructure**: In-memory and SeaORM/SQLite storage, credential checks
//! - **interfaces**: The OCPP WebSocket server and protocol adapters
//! - **support**: OCPP-J frame codec, error types, shutdown signalling

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};
pub use infrastructure::{init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};
pub use server::{init_tracing, ServerHandle};
