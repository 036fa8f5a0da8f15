//! Database entities module

pub mod access_grant;
pub mod charge_tag;
pub mod connector;
pub mod message_log;
pub mod outbound_command;
pub mod station;
pub mod transaction;

pub use access_grant::Entity as AccessGrant;
pub use charge_tag::Entity as ChargeTag;
pub use connector::Entity as Connector;
pub use message_log::Entity as MessageLog;
pub use outbound_command::Entity as OutboundCommand;
pub use station::Entity as Station;
pub use transaction::Entity as Transaction;
