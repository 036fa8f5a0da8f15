//! Charge tag and access grant repository interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{AccessGrant, AuthStatus, ChargeTag};
use crate::domain::DomainResult;

#[async_trait]
pub trait ChargeTagRepository: Send + Sync {
    async fn find_by_tag_id(&self, tag_id: &str) -> DomainResult<Option<ChargeTag>>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ChargeTag>>;

    /// Insert a new tag and return it with its assigned id.
    async fn create(&self, tag: ChargeTag) -> DomainResult<ChargeTag>;

    async fn update(&self, tag: ChargeTag) -> DomainResult<()>;
}

#[async_trait]
pub trait AccessGrantRepository: Send + Sync {
    async fn find(&self, tag_pk: i32, station_id: &str) -> DomainResult<Option<AccessGrant>>;

    /// Insert a new grant and return it with its assigned id.
    async fn create(&self, grant: AccessGrant) -> DomainResult<AccessGrant>;

    async fn update_status(
        &self,
        id: i32,
        status: AuthStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<()>;
}
