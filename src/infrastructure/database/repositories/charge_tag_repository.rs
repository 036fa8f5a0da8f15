//! SeaORM implementations of ChargeTagRepository and AccessGrantRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
};

use super::db_err;
use crate::domain::charge_tag::{AccessGrantRepository, ChargeTagRepository};
use crate::domain::{AccessGrant, AuthStatus, ChargeTag, DomainError, DomainResult};
use crate::infrastructure::database::entities::{access_grant, charge_tag};

pub struct SeaOrmChargeTagRepository {
    db: DatabaseConnection,
}

impl SeaOrmChargeTagRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub struct SeaOrmAccessGrantRepository {
    db: DatabaseConnection,
}

impl SeaOrmAccessGrantRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

pub(crate) fn tag_to_domain(m: charge_tag::Model) -> ChargeTag {
    ChargeTag {
        id: m.id,
        tag_id: m.tag_id,
        name: m.name,
        parent_tag_id: m.parent_tag_id,
        expiry: m.expiry,
        status: AuthStatus::from(m.status.as_str()),
    }
}

pub(crate) fn grant_to_domain(m: access_grant::Model) -> AccessGrant {
    AccessGrant {
        id: m.id,
        tag_pk: m.tag_pk,
        station_id: m.station_id,
        status: AuthStatus::from(m.status.as_str()),
        expiry: m.expiry,
        updated_at: m.updated_at,
    }
}

// ── ChargeTagRepository impl ────────────────────────────────────

#[async_trait]
impl ChargeTagRepository for SeaOrmChargeTagRepository {
    async fn find_by_tag_id(&self, tag_id: &str) -> DomainResult<Option<ChargeTag>> {
        let model = charge_tag::Entity::find()
            .filter(charge_tag::Column::TagId.eq(tag_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(tag_to_domain))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ChargeTag>> {
        let model = charge_tag::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(tag_to_domain))
    }

    async fn create(&self, tag: ChargeTag) -> DomainResult<ChargeTag> {
        let model = charge_tag::ActiveModel {
            id: NotSet,
            tag_id: Set(tag.tag_id),
            name: Set(tag.name),
            parent_tag_id: Set(tag.parent_tag_id),
            expiry: Set(tag.expiry),
            status: Set(tag.status.as_str().to_string()),
        };
        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        Ok(tag_to_domain(inserted))
    }

    async fn update(&self, tag: ChargeTag) -> DomainResult<()> {
        let Some(existing) = charge_tag::Entity::find_by_id(tag.id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Err(DomainError::not_found("ChargeTag", "id", tag.id));
        };
        let mut model: charge_tag::ActiveModel = existing.into();
        model.tag_id = Set(tag.tag_id);
        model.name = Set(tag.name);
        model.parent_tag_id = Set(tag.parent_tag_id);
        model.expiry = Set(tag.expiry);
        model.status = Set(tag.status.as_str().to_string());
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}

// ── AccessGrantRepository impl ──────────────────────────────────

#[async_trait]
impl AccessGrantRepository for SeaOrmAccessGrantRepository {
    async fn find(&self, tag_pk: i32, station_id: &str) -> DomainResult<Option<AccessGrant>> {
        let model = access_grant::Entity::find()
            .filter(access_grant::Column::TagPk.eq(tag_pk))
            .filter(access_grant::Column::StationId.eq(station_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(grant_to_domain))
    }

    async fn create(&self, grant: AccessGrant) -> DomainResult<AccessGrant> {
        let model = access_grant::ActiveModel {
            id: NotSet,
            tag_pk: Set(grant.tag_pk),
            station_id: Set(grant.station_id),
            status: Set(grant.status.as_str().to_string()),
            expiry: Set(grant.expiry),
            updated_at: Set(grant.updated_at),
        };
        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        Ok(grant_to_domain(inserted))
    }

    async fn update_status(&self, id: i32, status: AuthStatus, now: DateTime<Utc>) -> DomainResult<()> {
        let Some(existing) = access_grant::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Err(DomainError::not_found("AccessGrant", "id", id));
        };
        let mut model: access_grant::ActiveModel = existing.into();
        model.status = Set(status.as_str().to_string());
        model.updated_at = Set(now);
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}
