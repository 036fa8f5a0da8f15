//! SeaORM implementation of TransactionRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::db_err;
use crate::domain::transaction::TransactionRepository;
use crate::domain::{
    AuthStatus, DomainError, DomainResult, NewTransaction, Transaction, TransactionStatus,
    TransactionStop,
};
use crate::infrastructure::database::entities::{access_grant, charge_tag, transaction};

pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(t: transaction::Model) -> Transaction {
    Transaction {
        id: t.id,
        station_id: t.station_id,
        connector_id: t.connector_id,
        device_uid: t.device_uid,
        start_tag_pk: t.start_tag_pk,
        start_tag_id: t.start_tag_id,
        start_time: t.start_time,
        meter_start: t.meter_start,
        stop_tag_pk: t.stop_tag_pk,
        stop_tag_id: t.stop_tag_id,
        stop_time: t.stop_time,
        meter_stop: t.meter_stop,
        stop_reason: t.stop_reason,
        status: TransactionStatus::parse(&t.status),
        transaction_data: t.transaction_data,
    }
}

async fn set_grant_status<C: ConnectionTrait>(
    conn: &C,
    grant_id: i32,
    status: AuthStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> DomainResult<()> {
    let Some(grant) = access_grant::Entity::find_by_id(grant_id)
        .one(conn)
        .await
        .map_err(db_err)?
    else {
        return Err(DomainError::not_found("AccessGrant", "id", grant_id));
    };
    let mut model: access_grant::ActiveModel = grant.into();
    model.status = Set(status.as_str().to_string());
    model.updated_at = Set(now);
    model.update(conn).await.map_err(db_err)?;
    Ok(())
}

async fn set_tag_status<C: ConnectionTrait>(conn: &C, tag_pk: i32, status: AuthStatus) -> DomainResult<bool> {
    let Some(tag) = charge_tag::Entity::find_by_id(tag_pk)
        .one(conn)
        .await
        .map_err(db_err)?
    else {
        return Ok(false);
    };
    let mut model: charge_tag::ActiveModel = tag.into();
    model.status = Set(status.as_str().to_string());
    model.update(conn).await.map_err(db_err)?;
    Ok(true)
}

// ── TransactionRepository impl ──────────────────────────────────

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Transaction>> {
        let model = transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_by_device_uid(&self, station_id: &str, device_uid: &str) -> DomainResult<Option<Transaction>> {
        let model = transaction::Entity::find()
            .filter(transaction::Column::StationId.eq(station_id))
            .filter(transaction::Column::DeviceUid.eq(device_uid))
            .order_by_desc(transaction::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn latest_started(
        &self,
        station_id: &str,
        connector_id: i32,
        start_tag_pk: Option<i32>,
    ) -> DomainResult<Option<Transaction>> {
        let mut query = transaction::Entity::find()
            .filter(transaction::Column::StationId.eq(station_id))
            .filter(transaction::Column::ConnectorId.eq(connector_id))
            .filter(transaction::Column::Status.eq(TransactionStatus::Started.as_str()));
        if let Some(pk) = start_tag_pk {
            query = query.filter(transaction::Column::StartTagPk.eq(pk));
        }
        let model = query
            .order_by_desc(transaction::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn latest_for_connector(&self, station_id: &str, connector_id: i32) -> DomainResult<Option<Transaction>> {
        let model = transaction::Entity::find()
            .filter(transaction::Column::StationId.eq(station_id))
            .filter(transaction::Column::ConnectorId.eq(connector_id))
            .order_by_desc(transaction::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn list_for_connector(&self, station_id: &str, connector_id: i32) -> DomainResult<Vec<Transaction>> {
        let models = transaction::Entity::find()
            .filter(transaction::Column::StationId.eq(station_id))
            .filter(transaction::Column::ConnectorId.eq(connector_id))
            .order_by_asc(transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn open_transaction(&self, tx: NewTransaction, grant_id: i32, tag_pk: i32) -> DomainResult<Transaction> {
        debug!(
            station_id = tx.station_id.as_str(),
            connector_id = tx.connector_id,
            "Opening transaction"
        );
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = tx.start_time;

        let model = transaction::ActiveModel {
            id: NotSet,
            station_id: Set(tx.station_id),
            connector_id: Set(tx.connector_id),
            device_uid: Set(tx.device_uid),
            start_tag_pk: Set(tx.start_tag_pk),
            start_tag_id: Set(tx.start_tag_id),
            start_time: Set(tx.start_time),
            meter_start: Set(tx.meter_start),
            stop_tag_pk: Set(None),
            stop_tag_id: Set(None),
            stop_time: Set(None),
            meter_stop: Set(None),
            stop_reason: Set(None),
            status: Set(TransactionStatus::Started.as_str().to_string()),
            transaction_data: Set(None),
        };
        let inserted = model.insert(&txn).await.map_err(db_err)?;
        set_grant_status(&txn, grant_id, AuthStatus::ConcurrentTx, now).await?;
        if !set_tag_status(&txn, tag_pk, AuthStatus::ConcurrentTx).await? {
            return Err(DomainError::not_found("ChargeTag", "id", tag_pk));
        }

        // Dropping `txn` on any early return above rolls everything back
        txn.commit().await.map_err(db_err)?;
        Ok(model_to_domain(inserted))
    }

    async fn close_transaction(&self, id: i32, stop: TransactionStop) -> DomainResult<Option<Transaction>> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let Some(existing) = transaction::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        if existing.status != TransactionStatus::Started.as_str() {
            return Err(DomainError::Conflict(format!(
                "transaction {} is {}",
                id, existing.status
            )));
        }

        let start_tag_pk = existing.start_tag_pk;
        let station_id = existing.station_id.clone();
        let mut model: transaction::ActiveModel = existing.into();
        model.stop_tag_pk = Set(stop.stop_tag_pk);
        model.stop_tag_id = Set(stop.stop_tag_id.clone());
        model.stop_time = Set(Some(stop.stop_time));
        model.meter_stop = Set(Some(stop.meter_stop));
        model.stop_reason = Set(stop.reason.clone());
        model.status = Set(stop.status.as_str().to_string());
        model.transaction_data = Set(stop.transaction_data.clone());
        let updated = model.update(&txn).await.map_err(db_err)?;

        let grant = access_grant::Entity::find()
            .filter(access_grant::Column::TagPk.eq(start_tag_pk))
            .filter(access_grant::Column::StationId.eq(station_id.as_str()))
            .one(&txn)
            .await
            .map_err(db_err)?;
        if let Some(grant) = grant {
            set_grant_status(&txn, grant.id, AuthStatus::Accepted, stop.stop_time).await?;
        }
        set_tag_status(&txn, start_tag_pk, AuthStatus::Accepted).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(Some(model_to_domain(updated)))
    }

    async fn set_device_uid(&self, id: i32, device_uid: &str) -> DomainResult<()> {
        let Some(existing) = transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Err(DomainError::not_found("Transaction", "id", id));
        };
        let mut model: transaction::ActiveModel = existing.into();
        model.device_uid = Set(Some(device_uid.to_string()));
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charge_tag::{AccessGrantRepository, ChargeTagRepository};
    use crate::domain::station::StationRepository;
    use crate::domain::{AccessGrant, ChargeTag, Station};
    use crate::infrastructure::database::repositories::charge_tag_repository::{
        SeaOrmAccessGrantRepository, SeaOrmChargeTagRepository,
    };
    use crate::infrastructure::database::repositories::station_repository::SeaOrmStationRepository;
    use crate::infrastructure::database::repositories::test_support::memory_db;
    use chrono::Utc;

    #[tokio::test]
    async fn open_and_close_are_atomic_with_lock_toggle() {
        let db = memory_db().await;
        SeaOrmStationRepository::new(db.clone())
            .save(Station::new("CP1"))
            .await
            .unwrap();
        let tags = SeaOrmChargeTagRepository::new(db.clone());
        let grants = SeaOrmAccessGrantRepository::new(db.clone());
        let repo = SeaOrmTransactionRepository::new(db);

        let tag = tags.create(ChargeTag::new("ABC123")).await.unwrap();
        let grant = grants.create(AccessGrant::new(tag.id, "CP1")).await.unwrap();

        let new_tx = NewTransaction {
            station_id: "CP1".into(),
            connector_id: 1,
            device_uid: None,
            start_tag_pk: tag.id,
            start_tag_id: tag.tag_id.clone(),
            start_time: Utc::now(),
            meter_start: 1.0,
        };

        // Unknown grant: nothing is written
        assert!(repo.open_transaction(new_tx.clone(), 999, tag.id).await.is_err());
        assert!(repo.list_for_connector("CP1", 1).await.unwrap().is_empty());

        let opened = repo.open_transaction(new_tx, grant.id, tag.id).await.unwrap();
        let found = repo.latest_started("CP1", 1, Some(tag.id)).await.unwrap().unwrap();
        assert_eq!(found.id, opened.id);
        assert_eq!(
            grants.find(tag.id, "CP1").await.unwrap().unwrap().status,
            AuthStatus::ConcurrentTx
        );

        let stop = TransactionStop {
            stop_tag_pk: Some(tag.id),
            stop_tag_id: Some("ABC123".into()),
            stop_time: Utc::now(),
            meter_stop: 5.0,
            reason: Some("Local".into()),
            transaction_data: None,
            status: TransactionStatus::Completed,
        };
        let closed = repo.close_transaction(opened.id, stop).await.unwrap().unwrap();
        assert_eq!(closed.status, TransactionStatus::Completed);
        assert_eq!(closed.energy_kwh(), Some(4.0));
        assert_eq!(
            tags.find_by_id(tag.id).await.unwrap().unwrap().status,
            AuthStatus::Accepted
        );
        assert!(repo.latest_started("CP1", 1, None).await.unwrap().is_none());
    }
}
