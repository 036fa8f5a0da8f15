//! Outbound command repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{CommandStatus, NewCommand, OutboundCommand};
use crate::domain::DomainResult;

#[async_trait]
pub trait CommandRepository: Send + Sync {
    async fn create(&self, cmd: NewCommand) -> DomainResult<OutboundCommand>;

    async fn find_by_uid(&self, uid: &str) -> DomainResult<Option<OutboundCommand>>;

    /// Every `Queued` command for the station, oldest first.
    async fn due_for_station(&self, station_id: &str) -> DomainResult<Vec<OutboundCommand>>;

    /// Compare-and-set the status. Returns `false` when the command is
    /// missing or not in `from`.
    async fn transition(
        &self,
        uid: &str,
        from: CommandStatus,
        to: CommandStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Record the final status and the raw answer of a `Sent` command.
    async fn complete(
        &self,
        uid: &str,
        status: CommandStatus,
        result: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;
}
