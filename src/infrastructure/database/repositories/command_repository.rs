//! SeaORM implementation of CommandRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use tracing::warn;

use super::db_err;
use crate::domain::command::CommandRepository;
use crate::domain::{CommandStatus, CommandType, DomainResult, NewCommand, OutboundCommand};
use crate::infrastructure::database::entities::outbound_command;
use crate::support::errors::InfraError;

pub struct SeaOrmCommandRepository {
    db: DatabaseConnection,
}

impl SeaOrmCommandRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Rows with an unknown type or status are skipped with a warning.
fn model_to_domain(m: outbound_command::Model) -> Option<OutboundCommand> {
    let (Some(command_type), Some(status)) = (
        CommandType::parse(&m.command_type),
        CommandStatus::parse(&m.status),
    ) else {
        warn!(
            uid = m.uid.as_str(),
            command_type = m.command_type.as_str(),
            status = m.status.as_str(),
            "Skipping unreadable command row"
        );
        return None;
    };
    let payload = serde_json::from_str(&m.payload).unwrap_or(serde_json::Value::Null);
    Some(OutboundCommand {
        id: m.id,
        uid: m.uid,
        station_id: m.station_id,
        connector_id: m.connector_id,
        tag_id: m.tag_id,
        command_type,
        payload,
        status,
        result: m.result,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

#[async_trait]
impl CommandRepository for SeaOrmCommandRepository {
    async fn create(&self, cmd: NewCommand) -> DomainResult<OutboundCommand> {
        let now = Utc::now();
        let payload = serde_json::to_string(&cmd.payload).map_err(InfraError::from)?;
        let model = outbound_command::ActiveModel {
            id: NotSet,
            uid: Set(cmd.uid.clone()),
            station_id: Set(cmd.station_id.clone()),
            connector_id: Set(cmd.connector_id),
            tag_id: Set(cmd.tag_id.clone()),
            command_type: Set(cmd.command_type.as_str().to_string()),
            payload: Set(payload),
            status: Set(CommandStatus::Queued.as_str().to_string()),
            result: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        Ok(cmd.into_command(inserted.id, now))
    }

    async fn find_by_uid(&self, uid: &str) -> DomainResult<Option<OutboundCommand>> {
        let model = outbound_command::Entity::find()
            .filter(outbound_command::Column::Uid.eq(uid))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.and_then(model_to_domain))
    }

    async fn due_for_station(&self, station_id: &str) -> DomainResult<Vec<OutboundCommand>> {
        let models = outbound_command::Entity::find()
            .filter(outbound_command::Column::StationId.eq(station_id))
            .filter(outbound_command::Column::Status.eq(CommandStatus::Queued.as_str()))
            .order_by_asc(outbound_command::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().filter_map(model_to_domain).collect())
    }

    async fn transition(
        &self,
        uid: &str,
        from: CommandStatus,
        to: CommandStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = outbound_command::Entity::update_many()
            .col_expr(outbound_command::Column::Status, Expr::value(to.as_str()))
            .col_expr(outbound_command::Column::UpdatedAt, Expr::value(now))
            .filter(outbound_command::Column::Uid.eq(uid))
            .filter(outbound_command::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn complete(
        &self,
        uid: &str,
        status: CommandStatus,
        result: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let updated = outbound_command::Entity::update_many()
            .col_expr(outbound_command::Column::Status, Expr::value(status.as_str()))
            .col_expr(outbound_command::Column::Result, Expr::value(result))
            .col_expr(outbound_command::Column::UpdatedAt, Expr::value(now))
            .filter(outbound_command::Column::Uid.eq(uid))
            .filter(outbound_command::Column::Status.eq(CommandStatus::Sent.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(updated.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::repositories::test_support::memory_db;
    use serde_json::json;

    fn reset(uid: &str) -> NewCommand {
        NewCommand {
            uid: uid.into(),
            station_id: "CP1".into(),
            connector_id: None,
            tag_id: None,
            command_type: CommandType::Reset,
            payload: json!({"type": "Soft"}),
        }
    }

    #[tokio::test]
    async fn queued_commands_flow_through_sent_to_completed() {
        let repo = SeaOrmCommandRepository::new(memory_db().await);
        repo.create(reset("a")).await.unwrap();
        repo.create(reset("b")).await.unwrap();

        let due = repo.due_for_station("CP1").await.unwrap();
        assert_eq!(due.iter().map(|c| c.uid.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(due[0].payload["type"], "Soft");

        let now = Utc::now();
        assert!(repo.transition("a", CommandStatus::Queued, CommandStatus::Sent, now).await.unwrap());
        assert!(!repo.transition("a", CommandStatus::Queued, CommandStatus::Sent, now).await.unwrap());
        assert!(repo
            .complete("a", CommandStatus::Completed, Some(r#"{"status":"Accepted"}"#.into()), now)
            .await
            .unwrap());

        let done = repo.find_by_uid("a").await.unwrap().unwrap();
        assert_eq!(done.status, CommandStatus::Completed);
        assert_eq!(repo.due_for_station("CP1").await.unwrap().len(), 1);
    }
}
