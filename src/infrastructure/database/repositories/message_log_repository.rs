//! SeaORM implementation of MessageLogRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::db_err;
use crate::domain::message_log::MessageLogRepository;
use crate::domain::{Direction, DomainResult, MessageLogEntry};
use crate::infrastructure::database::entities::message_log;

pub struct SeaOrmMessageLogRepository {
    db: DatabaseConnection,
}

impl SeaOrmMessageLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageLogRepository for SeaOrmMessageLogRepository {
    async fn append(&self, entry: MessageLogEntry) -> DomainResult<()> {
        let model = message_log::ActiveModel {
            id: NotSet,
            log_time: Set(entry.log_time),
            station_id: Set(entry.station_id),
            connector_id: Set(entry.connector_id),
            message: Set(entry.message),
            result: Set(entry.result),
            error_code: Set(entry.error_code),
            direction: Set(entry.direction.as_str().to_string()),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn list_for_station(&self, station_id: &str, limit: u64) -> DomainResult<Vec<MessageLogEntry>> {
        let models = message_log::Entity::find()
            .filter(message_log::Column::StationId.eq(station_id))
            .order_by_desc(message_log::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models
            .into_iter()
            .map(|m| MessageLogEntry {
                log_time: m.log_time,
                station_id: m.station_id,
                connector_id: m.connector_id,
                message: m.message,
                result: m.result,
                error_code: m.error_code,
                direction: Direction::parse(&m.direction),
            })
            .collect())
    }
}
