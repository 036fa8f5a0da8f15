//! Domain layer: entities, status enums and repository contracts

pub mod charge_tag;
pub mod command;
pub mod connector;
pub mod message_log;
pub mod ocpp;
pub mod ports;
pub mod repositories;
pub mod station;
pub mod transaction;

pub use charge_tag::{AccessGrant, AuthStatus, ChargeTag, Lookup, Resolution, INVALID_ID};
pub use command::{CommandStatus, CommandType, NewCommand, OutboundCommand};
pub use connector::{Connector, ConnectorUpdate, LiveConnectorMetrics, LiveTelemetry};
pub use message_log::{Direction, MessageLogEntry};
pub use ocpp::OcppVersion;
pub use ports::{ProtocolError, ProtocolHandler, ProtocolHandlerFactory};
pub use repositories::{DomainResult, RepositoryProvider};
pub use station::{BootInfo, Station};
pub use transaction::{NewTransaction, Transaction, TransactionStatus, TransactionStop};

pub use crate::support::errors::DomainError;
