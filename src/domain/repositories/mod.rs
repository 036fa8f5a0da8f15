//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::charge_tag::{AccessGrantRepository, ChargeTagRepository};
use super::command::CommandRepository;
use super::connector::ConnectorRepository;
use super::message_log::MessageLogRepository;
use super::station::StationRepository;
use super::transaction::TransactionRepository;
use crate::support::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

// ── RepositoryProvider ──────────────────────────────────────────

/// Provides access to all domain repositories.
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let station = repos.stations().find_by_id("CP1").await?;
///     let tx = repos.transactions().latest_started("CP1", 1, None).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn stations(&self) -> &dyn StationRepository;
    fn connectors(&self) -> &dyn ConnectorRepository;
    fn charge_tags(&self) -> &dyn ChargeTagRepository;
    fn access_grants(&self) -> &dyn AccessGrantRepository;
    fn transactions(&self) -> &dyn TransactionRepository;
    fn commands(&self) -> &dyn CommandRepository;
    fn message_log(&self) -> &dyn MessageLogRepository;
}
