//! In-memory repository provider for tests and ephemeral runs

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::charge_tag::{AccessGrantRepository, ChargeTagRepository};
use crate::domain::command::CommandRepository;
use crate::domain::connector::ConnectorRepository;
use crate::domain::message_log::MessageLogRepository;
use crate::domain::station::StationRepository;
use crate::domain::transaction::TransactionRepository;
use crate::domain::{
    AccessGrant, AuthStatus, BootInfo, ChargeTag, CommandStatus, Connector, ConnectorUpdate,
    DomainError, DomainResult, MessageLogEntry, NewCommand, NewTransaction, OutboundCommand,
    RepositoryProvider, Station, Transaction, TransactionStatus, TransactionStop,
};

/// Every repository backed by `DashMap`s.
///
/// Compound operations take `compound` so their writes become visible
/// together.
pub struct InMemoryRepositoryProvider {
    stations: DashMap<String, Station>,
    connectors: DashMap<(String, i32), Connector>,
    tags: DashMap<i32, ChargeTag>,
    grants: DashMap<i32, AccessGrant>,
    transactions: DashMap<i32, Transaction>,
    commands: DashMap<String, OutboundCommand>,
    message_log: DashMap<u64, MessageLogEntry>,
    compound: Mutex<()>,
    tag_counter: AtomicI32,
    grant_counter: AtomicI32,
    transaction_counter: AtomicI32,
    command_counter: AtomicI32,
    log_counter: std::sync::atomic::AtomicU64,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self {
            stations: DashMap::new(),
            connectors: DashMap::new(),
            tags: DashMap::new(),
            grants: DashMap::new(),
            transactions: DashMap::new(),
            commands: DashMap::new(),
            message_log: DashMap::new(),
            compound: Mutex::new(()),
            tag_counter: AtomicI32::new(1),
            grant_counter: AtomicI32::new(1),
            transaction_counter: AtomicI32::new(1),
            command_counter: AtomicI32::new(1),
            log_counter: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn set_tag_status(&self, tag_pk: i32, status: AuthStatus) -> DomainResult<()> {
        let mut tag = self
            .tags
            .get_mut(&tag_pk)
            .ok_or_else(|| DomainError::not_found("ChargeTag", "id", tag_pk))?;
        tag.status = status;
        Ok(())
    }

    fn set_grant_status(&self, grant_id: i32, status: AuthStatus, now: DateTime<Utc>) -> DomainResult<()> {
        let mut grant = self
            .grants
            .get_mut(&grant_id)
            .ok_or_else(|| DomainError::not_found("AccessGrant", "id", grant_id))?;
        grant.status = status;
        grant.updated_at = now;
        Ok(())
    }

    fn grant_id_for(&self, tag_pk: i32, station_id: &str) -> Option<i32> {
        self.grants
            .iter()
            .find(|g| g.tag_pk == tag_pk && g.station_id == station_id)
            .map(|g| g.id)
    }

    fn connector_transactions(&self, station_id: &str, connector_id: i32) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.station_id == station_id && t.connector_id == connector_id)
            .map(|t| t.value().clone())
            .collect();
        all.sort_by_key(|t| t.id);
        all
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn stations(&self) -> &dyn StationRepository {
        self
    }
    fn connectors(&self) -> &dyn ConnectorRepository {
        self
    }
    fn charge_tags(&self) -> &dyn ChargeTagRepository {
        self
    }
    fn access_grants(&self) -> &dyn AccessGrantRepository {
        self
    }
    fn transactions(&self) -> &dyn TransactionRepository {
        self
    }
    fn commands(&self) -> &dyn CommandRepository {
        self
    }
    fn message_log(&self) -> &dyn MessageLogRepository {
        self
    }
}

// ── Stations ───────────────────────────────────────────────────

#[async_trait]
impl StationRepository for InMemoryRepositoryProvider {
    async fn find_by_id(&self, station_id: &str) -> DomainResult<Option<Station>> {
        Ok(self.stations.get(station_id).map(|s| s.clone()))
    }

    async fn save(&self, station: Station) -> DomainResult<()> {
        self.stations.insert(station.station_id.clone(), station);
        Ok(())
    }

    async fn apply_boot(&self, station_id: &str, boot: &BootInfo, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.stations.get_mut(station_id) {
            Some(mut station) => {
                station.apply_boot(boot, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, station_id: &str, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.stations.get_mut(station_id) {
            Some(mut station) => {
                station.last_seen = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── Connectors ─────────────────────────────────────────────────

#[async_trait]
impl ConnectorRepository for InMemoryRepositoryProvider {
    async fn find(&self, station_id: &str, connector_id: i32) -> DomainResult<Option<Connector>> {
        Ok(self
            .connectors
            .get(&(station_id.to_string(), connector_id))
            .map(|c| c.clone()))
    }

    async fn upsert(
        &self,
        station_id: &str,
        connector_id: i32,
        update: &ConnectorUpdate,
    ) -> DomainResult<Connector> {
        let mut entry = self
            .connectors
            .entry((station_id.to_string(), connector_id))
            .or_insert_with(|| Connector::new(station_id, connector_id));
        entry.apply(update);
        Ok(entry.clone())
    }

    async fn list_for_station(&self, station_id: &str) -> DomainResult<Vec<Connector>> {
        let mut all: Vec<Connector> = self
            .connectors
            .iter()
            .filter(|c| c.station_id == station_id)
            .map(|c| c.value().clone())
            .collect();
        all.sort_by_key(|c| c.connector_id);
        Ok(all)
    }
}

// ── Charge tags and grants ─────────────────────────────────────

#[async_trait]
impl ChargeTagRepository for InMemoryRepositoryProvider {
    async fn find_by_tag_id(&self, tag_id: &str) -> DomainResult<Option<ChargeTag>> {
        Ok(self
            .tags
            .iter()
            .find(|t| t.tag_id == tag_id)
            .map(|t| t.value().clone()))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<ChargeTag>> {
        Ok(self.tags.get(&id).map(|t| t.clone()))
    }

    async fn create(&self, mut tag: ChargeTag) -> DomainResult<ChargeTag> {
        if self.find_by_tag_id(&tag.tag_id).await?.is_some() {
            return Err(DomainError::Conflict(format!("tag {}", tag.tag_id)));
        }
        tag.id = self.tag_counter.fetch_add(1, Ordering::SeqCst);
        self.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn update(&self, tag: ChargeTag) -> DomainResult<()> {
        if !self.tags.contains_key(&tag.id) {
            return Err(DomainError::not_found("ChargeTag", "id", tag.id));
        }
        self.tags.insert(tag.id, tag);
        Ok(())
    }
}

#[async_trait]
impl AccessGrantRepository for InMemoryRepositoryProvider {
    async fn find(&self, tag_pk: i32, station_id: &str) -> DomainResult<Option<AccessGrant>> {
        Ok(self
            .grants
            .iter()
            .find(|g| g.tag_pk == tag_pk && g.station_id == station_id)
            .map(|g| g.value().clone()))
    }

    async fn create(&self, mut grant: AccessGrant) -> DomainResult<AccessGrant> {
        let _guard = self.compound.lock().await;
        if self.grant_id_for(grant.tag_pk, &grant.station_id).is_some() {
            return Err(DomainError::Conflict(format!(
                "grant for tag {} on {}",
                grant.tag_pk, grant.station_id
            )));
        }
        grant.id = self.grant_counter.fetch_add(1, Ordering::SeqCst);
        self.grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn update_status(&self, id: i32, status: AuthStatus, now: DateTime<Utc>) -> DomainResult<()> {
        self.set_grant_status(id, status, now)
    }
}

// ── Transactions ───────────────────────────────────────────────

#[async_trait]
impl TransactionRepository for InMemoryRepositoryProvider {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Transaction>> {
        Ok(self.transactions.get(&id).map(|t| t.clone()))
    }

    async fn find_by_device_uid(&self, station_id: &str, device_uid: &str) -> DomainResult<Option<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.station_id == station_id && t.device_uid.as_deref() == Some(device_uid))
            .max_by_key(|t| t.id)
            .map(|t| t.value().clone()))
    }

    async fn latest_started(
        &self,
        station_id: &str,
        connector_id: i32,
        start_tag_pk: Option<i32>,
    ) -> DomainResult<Option<Transaction>> {
        Ok(self
            .connector_transactions(station_id, connector_id)
            .into_iter()
            .filter(|t| t.status.is_open())
            .filter(|t| start_tag_pk.map_or(true, |pk| t.start_tag_pk == pk))
            .last())
    }

    async fn latest_for_connector(&self, station_id: &str, connector_id: i32) -> DomainResult<Option<Transaction>> {
        Ok(self.connector_transactions(station_id, connector_id).pop())
    }

    async fn list_for_connector(&self, station_id: &str, connector_id: i32) -> DomainResult<Vec<Transaction>> {
        Ok(self.connector_transactions(station_id, connector_id))
    }

    async fn open_transaction(&self, tx: NewTransaction, grant_id: i32, tag_pk: i32) -> DomainResult<Transaction> {
        let _guard = self.compound.lock().await;
        if !self.grants.contains_key(&grant_id) {
            return Err(DomainError::not_found("AccessGrant", "id", grant_id));
        }
        if !self.tags.contains_key(&tag_pk) {
            return Err(DomainError::not_found("ChargeTag", "id", tag_pk));
        }

        let now = tx.start_time;
        let id = self.transaction_counter.fetch_add(1, Ordering::SeqCst);
        let created = tx.into_transaction(id);
        self.transactions.insert(id, created.clone());
        self.set_grant_status(grant_id, AuthStatus::ConcurrentTx, now)?;
        self.set_tag_status(tag_pk, AuthStatus::ConcurrentTx)?;
        Ok(created)
    }

    async fn close_transaction(&self, id: i32, stop: TransactionStop) -> DomainResult<Option<Transaction>> {
        let _guard = self.compound.lock().await;
        let Some(mut tx) = self.transactions.get(&id).map(|t| t.clone()) else {
            return Ok(None);
        };
        if tx.status != TransactionStatus::Started {
            return Err(DomainError::Conflict(format!("transaction {} is {}", id, tx.status)));
        }

        stop.apply_to(&mut tx);
        let grant_id = self.grant_id_for(tx.start_tag_pk, &tx.station_id);
        if let Some(grant_id) = grant_id {
            self.set_grant_status(grant_id, AuthStatus::Accepted, stop.stop_time)?;
        }
        if self.tags.contains_key(&tx.start_tag_pk) {
            self.set_tag_status(tx.start_tag_pk, AuthStatus::Accepted)?;
        }
        self.transactions.insert(id, tx.clone());
        Ok(Some(tx))
    }

    async fn set_device_uid(&self, id: i32, device_uid: &str) -> DomainResult<()> {
        let mut tx = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Transaction", "id", id))?;
        tx.device_uid = Some(device_uid.to_string());
        Ok(())
    }
}

// ── Commands ───────────────────────────────────────────────────

#[async_trait]
impl CommandRepository for InMemoryRepositoryProvider {
    async fn create(&self, cmd: NewCommand) -> DomainResult<OutboundCommand> {
        if self.commands.contains_key(&cmd.uid) {
            return Err(DomainError::Conflict(format!("command {}", cmd.uid)));
        }
        let id = self.command_counter.fetch_add(1, Ordering::SeqCst);
        let created = cmd.into_command(id, Utc::now());
        self.commands.insert(created.uid.clone(), created.clone());
        Ok(created)
    }

    async fn find_by_uid(&self, uid: &str) -> DomainResult<Option<OutboundCommand>> {
        Ok(self.commands.get(uid).map(|c| c.clone()))
    }

    async fn due_for_station(&self, station_id: &str) -> DomainResult<Vec<OutboundCommand>> {
        let mut due: Vec<OutboundCommand> = self
            .commands
            .iter()
            .filter(|c| c.station_id == station_id && c.status == CommandStatus::Queued)
            .map(|c| c.value().clone())
            .collect();
        due.sort_by_key(|c| c.id);
        Ok(due)
    }

    async fn transition(
        &self,
        uid: &str,
        from: CommandStatus,
        to: CommandStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        match self.commands.get_mut(uid) {
            Some(mut cmd) if cmd.status == from => {
                cmd.status = to;
                cmd.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        uid: &str,
        status: CommandStatus,
        result: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        match self.commands.get_mut(uid) {
            Some(mut cmd) if cmd.status == CommandStatus::Sent => {
                cmd.status = status;
                cmd.result = result;
                cmd.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ── Message log ────────────────────────────────────────────────

#[async_trait]
impl MessageLogRepository for InMemoryRepositoryProvider {
    async fn append(&self, entry: MessageLogEntry) -> DomainResult<()> {
        let key = self.log_counter.fetch_add(1, Ordering::SeqCst);
        self.message_log.insert(key, entry);
        Ok(())
    }

    async fn list_for_station(&self, station_id: &str, limit: u64) -> DomainResult<Vec<MessageLogEntry>> {
        let mut entries: Vec<(u64, MessageLogEntry)> = self
            .message_log
            .iter()
            .filter(|e| e.station_id == station_id)
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit as usize)
            .map(|(_, e)| e)
            .collect())
    }
}
