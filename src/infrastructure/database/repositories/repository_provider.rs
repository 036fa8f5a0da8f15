//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::charge_tag::{AccessGrantRepository, ChargeTagRepository};
use crate::domain::command::CommandRepository;
use crate::domain::connector::ConnectorRepository;
use crate::domain::message_log::MessageLogRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::station::StationRepository;
use crate::domain::transaction::TransactionRepository;

use super::charge_tag_repository::{SeaOrmAccessGrantRepository, SeaOrmChargeTagRepository};
use super::command_repository::SeaOrmCommandRepository;
use super::connector_repository::SeaOrmConnectorRepository;
use super::message_log_repository::SeaOrmMessageLogRepository;
use super::station_repository::SeaOrmStationRepository;
use super::transaction_repository::SeaOrmTransactionRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let station = repos.stations().find_by_id("CP1").await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    stations: SeaOrmStationRepository,
    connectors: SeaOrmConnectorRepository,
    charge_tags: SeaOrmChargeTagRepository,
    access_grants: SeaOrmAccessGrantRepository,
    transactions: SeaOrmTransactionRepository,
    commands: SeaOrmCommandRepository,
    message_log: SeaOrmMessageLogRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            stations: SeaOrmStationRepository::new(db.clone()),
            connectors: SeaOrmConnectorRepository::new(db.clone()),
            charge_tags: SeaOrmChargeTagRepository::new(db.clone()),
            access_grants: SeaOrmAccessGrantRepository::new(db.clone()),
            transactions: SeaOrmTransactionRepository::new(db.clone()),
            commands: SeaOrmCommandRepository::new(db.clone()),
            message_log: SeaOrmMessageLogRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn stations(&self) -> &dyn StationRepository {
        &self.stations
    }

    fn connectors(&self) -> &dyn ConnectorRepository {
        &self.connectors
    }

    fn charge_tags(&self) -> &dyn ChargeTagRepository {
        &self.charge_tags
    }

    fn access_grants(&self) -> &dyn AccessGrantRepository {
        &self.access_grants
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        &self.transactions
    }

    fn commands(&self) -> &dyn CommandRepository {
        &self.commands
    }

    fn message_log(&self) -> &dyn MessageLogRepository {
        &self.message_log
    }
}
