//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod charge_tag_repository;
pub mod command_repository;
pub mod connector_repository;
pub mod message_log_repository;
pub mod repository_provider;
pub mod station_repository;
pub mod transaction_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use crate::domain::DomainError;
use crate::support::errors::InfraError;

pub(crate) fn db_err(e: sea_orm::DbErr) -> DomainError {
    InfraError::Database(e).into()
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;

    use crate::infrastructure::database::migrator::Migrator;

    pub async fn memory_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }
}
