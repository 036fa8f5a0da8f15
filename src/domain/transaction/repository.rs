//! Transaction repository interface

use async_trait::async_trait;

use super::model::{NewTransaction, Transaction, TransactionStop};
use crate::domain::DomainResult;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Transaction>>;

    async fn find_by_device_uid(
        &self,
        station_id: &str,
        device_uid: &str,
    ) -> DomainResult<Option<Transaction>>;

    /// Latest `Started` transaction on the connector, optionally restricted to
    /// the tag that started it.
    async fn latest_started(
        &self,
        station_id: &str,
        connector_id: i32,
        start_tag_pk: Option<i32>,
    ) -> DomainResult<Option<Transaction>>;

    /// Latest transaction on the connector regardless of tag or status.
    async fn latest_for_connector(
        &self,
        station_id: &str,
        connector_id: i32,
    ) -> DomainResult<Option<Transaction>>;

    async fn list_for_connector(
        &self,
        station_id: &str,
        connector_id: i32,
    ) -> DomainResult<Vec<Transaction>>;

    /// Insert a `Started` transaction and mark the grant and tag
    /// `ConcurrentTx`, all or nothing.
    async fn open_transaction(
        &self,
        tx: NewTransaction,
        grant_id: i32,
        tag_pk: i32,
    ) -> DomainResult<Transaction>;

    /// Close a `Started` transaction and reset its start tag and that tag's
    /// grant on the station to `Accepted`, all or nothing.
    ///
    /// Returns `None` when no transaction has this id.
    async fn close_transaction(
        &self,
        id: i32,
        stop: TransactionStop,
    ) -> DomainResult<Option<Transaction>>;

    async fn set_device_uid(&self, id: i32, device_uid: &str) -> DomainResult<()>;
}
