//! Transaction service
//!
//! Start and stop of charging sessions, with the `ConcurrentTx` status of
//! tag and grant acting as the lock that keeps one open session per tag.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::authorization::{AccessDecision, AuthorizationReply, TagResolver};
use crate::application::connectors::ConnectorTracker;
use crate::domain::{
    AuthStatus, ConnectorUpdate, DomainResult, NewTransaction, RepositoryProvider, Transaction,
    TransactionStatus, TransactionStop, INVALID_ID,
};

/// Connector status written when a transaction starts.
const OCCUPIED: &str = "Occupied";

#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub connector_id: i32,
    pub tag_identifier: String,
    /// Wh
    pub meter_start: i64,
    pub timestamp: DateTime<Utc>,
    /// Transaction id chosen by an OCPP 2.0.1 station
    pub device_uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    /// [`INVALID_ID`] unless a transaction was opened or re-used
    pub transaction_id: i32,
    pub reply: AuthorizationReply,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopRequest {
    pub transaction_id: i32,
    /// Falls back to the tag that started the transaction
    pub tag_identifier: Option<String>,
    /// Wh
    pub meter_stop: i64,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
    /// Sampled values sent with the stop, as JSON
    pub transaction_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopOutcome {
    pub reply: AuthorizationReply,
    /// The closed transaction, when the stop was applied
    pub transaction: Option<Transaction>,
}

pub struct TransactionService {
    repos: Arc<dyn RepositoryProvider>,
    resolver: Arc<TagResolver>,
    tracker: Arc<ConnectorTracker>,
    default_expiry: Duration,
    connector_locks: DashMap<(String, i32), Arc<Mutex<()>>>,
}

fn wh_to_kwh(wh: i64) -> f64 {
    wh as f64 / 1000.0
}

impl TransactionService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        resolver: Arc<TagResolver>,
        tracker: Arc<ConnectorTracker>,
        default_expiry_minutes: i64,
    ) -> Self {
        Self {
            repos,
            resolver,
            tracker,
            default_expiry: Duration::minutes(default_expiry_minutes),
            connector_locks: DashMap::new(),
        }
    }

    /// Serialises start and stop on one (station, connector), for callers
    /// outside the station's own session loop such as remote commands.
    fn connector_lock(&self, station_id: &str, connector_id: i32) -> Arc<Mutex<()>> {
        self.connector_locks
            .entry((station_id.to_string(), connector_id))
            .or_default()
            .clone()
    }

    /// Pre-authorization with no transaction side effects.
    pub async fn authorize(&self, station_id: &str, tag_identifier: &str) -> DomainResult<AuthorizationReply> {
        let decision = self.resolver.authorize(tag_identifier, station_id).await?;
        info!(
            charge_point_id = station_id,
            tag_id = tag_identifier,
            status = %decision.status(),
            "Authorize"
        );
        Ok(decision.reply(decision.status(), Utc::now(), self.default_expiry))
    }

    pub async fn start(&self, station_id: &str, req: StartRequest) -> DomainResult<StartOutcome> {
        let decision = self.resolver.authorize(&req.tag_identifier, station_id).await?;
        let lock = self.connector_lock(station_id, req.connector_id);
        let _guard = lock.lock().await;

        let (transaction_id, status) = match decision.status() {
            AuthStatus::Accepted => self.open(station_id, &req, &decision).await?,
            AuthStatus::ConcurrentTx => self.start_with_held_lock(station_id, &req, &decision).await?,
            other => (INVALID_ID, other),
        };

        info!(
            charge_point_id = station_id,
            connector_id = req.connector_id,
            tag_id = req.tag_identifier.as_str(),
            transaction_id,
            status = %status,
            "StartTransaction"
        );
        Ok(StartOutcome {
            transaction_id,
            reply: decision.reply(status, Utc::now(), self.default_expiry),
        })
    }

    /// The tag already holds the lock on this station.
    async fn start_with_held_lock(
        &self,
        station_id: &str,
        req: &StartRequest,
        decision: &AccessDecision,
    ) -> DomainResult<(i32, AuthStatus)> {
        let transactions = self.repos.transactions();
        if let Some(own) = transactions
            .latest_started(station_id, req.connector_id, Some(decision.tag.id()))
            .await?
        {
            // Same tag re-authorizing its own active session
            return Ok((own.id, AuthStatus::ConcurrentTx));
        }

        // A free connector restarts through the Accepted path. This also runs
        // when the ConcurrentTx status is a leftover that no stop ever reset.
        match transactions.latest_for_connector(station_id, req.connector_id).await? {
            Some(latest) if !latest.status.is_open() => self.open(station_id, req, decision).await,
            _ => Ok((INVALID_ID, AuthStatus::Invalid)),
        }
    }

    async fn open(
        &self,
        station_id: &str,
        req: &StartRequest,
        decision: &AccessDecision,
    ) -> DomainResult<(i32, AuthStatus)> {
        let transactions = self.repos.transactions();
        if let Some(active) = transactions.latest_started(station_id, req.connector_id, None).await? {
            if active.start_tag_pk == decision.tag.id() {
                return Ok((active.id, AuthStatus::ConcurrentTx));
            }
            warn!(
                charge_point_id = station_id,
                connector_id = req.connector_id,
                active_transaction = active.id,
                "Connector already has an open transaction of another tag"
            );
            return Ok((INVALID_ID, AuthStatus::Invalid));
        }

        let Some(tag) = decision.tag.record() else {
            return Ok((INVALID_ID, AuthStatus::Invalid));
        };
        let meter_kwh = wh_to_kwh(req.meter_start);
        let new_tx = NewTransaction {
            station_id: station_id.to_string(),
            connector_id: req.connector_id,
            device_uid: req.device_uid.clone(),
            start_tag_pk: tag.id,
            start_tag_id: tag.tag_id.clone(),
            start_time: req.timestamp,
            meter_start: meter_kwh,
        };
        let created = transactions
            .open_transaction(new_tx, decision.grant.id(), tag.id)
            .await?;

        // The transaction is committed; a failed connector write must not undo the reply.
        if let Err(e) = self
            .tracker
            .update_status(
                station_id,
                req.connector_id,
                ConnectorUpdate::status(OCCUPIED, req.timestamp).with_meter(meter_kwh, Some(req.timestamp)),
            )
            .await
        {
            error!(
                charge_point_id = station_id,
                connector_id = req.connector_id,
                transaction_id = created.id,
                error = %e,
                "Connector status not updated for started transaction"
            );
        }
        Ok((created.id, AuthStatus::Accepted))
    }

    pub async fn stop(&self, station_id: &str, req: StopRequest) -> DomainResult<StopOutcome> {
        let existing = self.repos.transactions().find_by_id(req.transaction_id).await?;
        let existing = existing.filter(|tx| tx.station_id == station_id);

        let tag_identifier = match (&req.tag_identifier, &existing) {
            (Some(tag), _) => tag.clone(),
            (None, Some(tx)) => tx.start_tag_id.clone(),
            (None, None) => String::new(),
        };
        let decision = self.resolver.authorize(&tag_identifier, station_id).await?;
        let now = Utc::now();
        let reject = |status: AuthStatus| StopOutcome {
            reply: decision.reply(status, now, self.default_expiry),
            transaction: None,
        };

        if !decision.status().is_usable() {
            info!(
                charge_point_id = station_id,
                transaction_id = req.transaction_id,
                status = %decision.status(),
                "StopTransaction rejected"
            );
            return Ok(reject(decision.status()));
        }

        let Some(tx) = existing else {
            warn!(
                charge_point_id = station_id,
                transaction_id = req.transaction_id,
                "StopTransaction for unknown transaction"
            );
            return Ok(reject(AuthStatus::Invalid));
        };

        let lock = self.connector_lock(station_id, tx.connector_id);
        let _guard = lock.lock().await;

        if tx.status != TransactionStatus::Started {
            warn!(
                charge_point_id = station_id,
                transaction_id = tx.id,
                status = %tx.status,
                "StopTransaction for a closed transaction"
            );
            return Ok(reject(decision.status()));
        }

        let meter_kwh = wh_to_kwh(req.meter_stop);
        let stop = TransactionStop {
            stop_tag_pk: decision.tag.record().map(|t| t.id),
            stop_tag_id: decision.tag.record().map(|t| t.tag_id.clone()),
            stop_time: req.timestamp,
            meter_stop: meter_kwh,
            reason: req.reason.clone(),
            transaction_data: req.transaction_data.clone(),
            status: TransactionStatus::Completed,
        };
        let closed = self.repos.transactions().close_transaction(tx.id, stop).await?;
        let Some(closed) = closed else {
            return Ok(reject(AuthStatus::Invalid));
        };

        self.tracker
            .update_status(
                station_id,
                closed.connector_id,
                ConnectorUpdate::meter(meter_kwh, Some(req.timestamp)),
            )
            .await?;

        info!(
            charge_point_id = station_id,
            transaction_id = closed.id,
            energy_kwh = closed.energy_kwh(),
            "StopTransaction"
        );
        Ok(StopOutcome {
            reply: decision.reply(AuthStatus::Accepted, now, self.default_expiry),
            transaction: Some(closed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charge_tag::{AccessGrantRepository, ChargeTagRepository};
    use crate::domain::command::CommandRepository;
    use crate::domain::connector::ConnectorRepository;
    use crate::domain::message_log::MessageLogRepository;
    use crate::domain::station::StationRepository;
    use crate::domain::transaction::TransactionRepository;
    use crate::domain::{ChargeTag, Connector, DomainError, Station};
    use crate::infrastructure::InMemoryRepositoryProvider;

    struct Fixture {
        repos: Arc<InMemoryRepositoryProvider>,
        service: TransactionService,
    }

    async fn fixture() -> Fixture {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.stations().save(Station::new("CP1")).await.unwrap();
        for tag in ["ABC123", "OTHER"] {
            repos.charge_tags().create(ChargeTag::new(tag)).await.unwrap();
        }
        let resolver = Arc::new(TagResolver::new(repos.clone(), true));
        let tracker = Arc::new(ConnectorTracker::new(repos.clone()));
        let service = TransactionService::new(repos.clone(), resolver, tracker, 5);
        Fixture { repos, service }
    }

    fn start_req(tag: &str, connector: i32, meter: i64) -> StartRequest {
        StartRequest {
            connector_id: connector,
            tag_identifier: tag.into(),
            meter_start: meter,
            timestamp: Utc::now(),
            device_uid: None,
        }
    }

    fn stop_req(tx: i32, tag: Option<&str>, meter: i64) -> StopRequest {
        StopRequest {
            transaction_id: tx,
            tag_identifier: tag.map(str::to_string),
            meter_stop: meter,
            timestamp: Utc::now(),
            reason: None,
            transaction_data: None,
        }
    }

    async fn tag_status(repos: &InMemoryRepositoryProvider, tag: &str) -> (AuthStatus, AuthStatus) {
        let tag = repos.charge_tags().find_by_tag_id(tag).await.unwrap().unwrap();
        let grant = repos.access_grants().find(tag.id, "CP1").await.unwrap().unwrap();
        (tag.status, grant.status)
    }

    #[tokio::test]
    async fn authorize_start_stop_scenario() {
        let f = fixture().await;

        let auth = f.service.authorize("CP1", "ABC123_99").await.unwrap();
        assert_eq!(auth.status, AuthStatus::Accepted);

        let started = f.service.start("CP1", start_req("ABC123", 1, 1000)).await.unwrap();
        assert_eq!(started.reply.status, AuthStatus::Accepted);
        assert_ne!(started.transaction_id, INVALID_ID);
        assert_eq!(
            tag_status(&f.repos, "ABC123").await,
            (AuthStatus::ConcurrentTx, AuthStatus::ConcurrentTx)
        );
        let connector = f.repos.connectors().find("CP1", 1).await.unwrap().unwrap();
        assert_eq!(connector.last_status.as_deref(), Some(OCCUPIED));
        assert_eq!(connector.last_meter, Some(1.0));

        let stopped = f
            .service
            .stop("CP1", stop_req(started.transaction_id, Some("ABC123"), 5000))
            .await
            .unwrap();
        assert_eq!(stopped.reply.status, AuthStatus::Accepted);
        assert_eq!(
            tag_status(&f.repos, "ABC123").await,
            (AuthStatus::Accepted, AuthStatus::Accepted)
        );

        let tx = f
            .repos
            .transactions()
            .find_by_id(started.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.energy_kwh(), Some(4.0));
    }

    #[tokio::test]
    async fn repeated_start_is_idempotent() {
        let f = fixture().await;
        let first = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();
        let second = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();
        let third = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();

        assert_eq!(first.reply.status, AuthStatus::Accepted);
        assert_eq!(second.transaction_id, first.transaction_id);
        assert_eq!(second.reply.status, AuthStatus::ConcurrentTx);
        assert_eq!(third.transaction_id, first.transaction_id);
        assert_eq!(third.reply.status, AuthStatus::ConcurrentTx);
        assert_eq!(f.repos.transactions().list_for_connector("CP1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_tag_cannot_start_on_busy_connector() {
        let f = fixture().await;
        f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();

        let other = f.service.start("CP1", start_req("OTHER", 1, 0)).await.unwrap();
        assert_eq!(other.reply.status, AuthStatus::Invalid);
        assert_eq!(other.transaction_id, INVALID_ID);
        assert_eq!(f.repos.transactions().list_for_connector("CP1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_releases_lock_for_a_fresh_start() {
        let f = fixture().await;
        let first = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();
        f.service
            .stop("CP1", stop_req(first.transaction_id, None, 2000))
            .await
            .unwrap();

        let again = f.service.start("CP1", start_req("ABC123", 1, 2000)).await.unwrap();
        assert_eq!(again.reply.status, AuthStatus::Accepted);
        assert_ne!(again.transaction_id, first.transaction_id);
    }

    #[tokio::test]
    async fn stop_of_unknown_transaction_is_invalid_and_changes_nothing() {
        let f = fixture().await;
        let started = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();

        let outcome = f.service.stop("CP1", stop_req(999, Some("ABC123"), 10)).await.unwrap();
        assert_eq!(outcome.reply.status, AuthStatus::Invalid);
        assert!(outcome.transaction.is_none());
        let tx = f
            .repos
            .transactions()
            .find_by_id(started.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Started);
    }

    #[tokio::test]
    async fn blocked_tag_cannot_stop() {
        let f = fixture().await;
        let started = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();

        let mut blocked = ChargeTag::new("THIEF");
        blocked.status = AuthStatus::Blocked;
        f.repos.charge_tags().create(blocked).await.unwrap();

        let outcome = f
            .service
            .stop("CP1", stop_req(started.transaction_id, Some("THIEF"), 10))
            .await
            .unwrap();
        assert_eq!(outcome.reply.status, AuthStatus::Blocked);
        assert_eq!(
            tag_status(&f.repos, "ABC123").await,
            (AuthStatus::ConcurrentTx, AuthStatus::ConcurrentTx)
        );
    }

    #[tokio::test]
    async fn rejected_statuses_carry_no_transaction() {
        let f = fixture().await;
        let mut expired = ChargeTag::new("OLD");
        expired.expiry = Some(Utc::now() - Duration::minutes(1));
        f.repos.charge_tags().create(expired).await.unwrap();

        let outcome = f.service.start("CP1", start_req("OLD", 1, 0)).await.unwrap();
        assert_eq!(outcome.reply.status, AuthStatus::Expired);
        assert_eq!(outcome.transaction_id, INVALID_ID);

        let unknown = f.service.start("CP1", start_req("NOBODY", 1, 0)).await.unwrap();
        assert_eq!(unknown.reply.status, AuthStatus::Invalid);
        assert!(f.repos.transactions().list_for_connector("CP1", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_concurrent_status_restarts_on_free_connector() {
        let f = fixture().await;
        let first = f.service.start("CP1", start_req("ABC123", 1, 0)).await.unwrap();
        f.service
            .stop("CP1", stop_req(first.transaction_id, None, 100))
            .await
            .unwrap();

        // Leave a ConcurrentTx status behind, as a lost stop would
        let tag = f.repos.charge_tags().find_by_tag_id("ABC123").await.unwrap().unwrap();
        let grant = f.repos.access_grants().find(tag.id, "CP1").await.unwrap().unwrap();
        f.repos
            .access_grants()
            .update_status(grant.id, AuthStatus::ConcurrentTx, Utc::now())
            .await
            .unwrap();

        let again = f.service.start("CP1", start_req("ABC123", 1, 100)).await.unwrap();
        assert_eq!(again.reply.status, AuthStatus::Accepted);

        // Held lock with no transaction history on the connector
        let elsewhere = f.service.start("CP1", start_req("ABC123", 2, 0)).await.unwrap();
        assert_eq!(elsewhere.reply.status, AuthStatus::Invalid);
    }

    #[tokio::test]
    async fn expiry_defaults_to_five_minutes_and_parent_is_reported() {
        let f = fixture().await;
        let mut fleet = ChargeTag::new("CHILD");
        fleet.parent_tag_id = Some("FLEET".into());
        f.repos.charge_tags().create(fleet).await.unwrap();

        let before = Utc::now();
        let reply = f.service.authorize("CP1", "CHILD").await.unwrap();
        assert_eq!(reply.parent_tag.as_deref(), Some("FLEET"));
        assert!(reply.expiry >= before + Duration::minutes(5));
        assert!(reply.expiry <= Utc::now() + Duration::minutes(5));
    }

    struct FailingConnectors;

    #[async_trait::async_trait]
    impl ConnectorRepository for FailingConnectors {
        async fn find(&self, _station_id: &str, _connector_id: i32) -> DomainResult<Option<Connector>> {
            Err(DomainError::Storage("connectors unavailable".into()))
        }

        async fn upsert(
            &self,
            _station_id: &str,
            _connector_id: i32,
            _update: &ConnectorUpdate,
        ) -> DomainResult<Connector> {
            Err(DomainError::Storage("connectors unavailable".into()))
        }

        async fn list_for_station(&self, _station_id: &str) -> DomainResult<Vec<Connector>> {
            Err(DomainError::Storage("connectors unavailable".into()))
        }
    }

    /// Memory store whose connector table is down.
    struct ConnectorsDown {
        inner: Arc<InMemoryRepositoryProvider>,
        connectors: FailingConnectors,
    }

    impl RepositoryProvider for ConnectorsDown {
        fn stations(&self) -> &dyn StationRepository {
            self.inner.stations()
        }
        fn connectors(&self) -> &dyn ConnectorRepository {
            &self.connectors
        }
        fn charge_tags(&self) -> &dyn ChargeTagRepository {
            self.inner.charge_tags()
        }
        fn access_grants(&self) -> &dyn AccessGrantRepository {
            self.inner.access_grants()
        }
        fn transactions(&self) -> &dyn TransactionRepository {
            self.inner.transactions()
        }
        fn commands(&self) -> &dyn CommandRepository {
            self.inner.commands()
        }
        fn message_log(&self) -> &dyn MessageLogRepository {
            self.inner.message_log()
        }
    }

    #[tokio::test]
    async fn connector_write_failure_keeps_started_reply() {
        let f = fixture().await;
        let broken = Arc::new(ConnectorsDown {
            inner: f.repos.clone(),
            connectors: FailingConnectors,
        });
        let resolver = Arc::new(TagResolver::new(f.repos.clone(), true));
        let tracker = Arc::new(ConnectorTracker::new(broken));
        let service = TransactionService::new(f.repos.clone(), resolver, tracker, 5);

        let started = service.start("CP1", start_req("ABC123", 1, 1000)).await.unwrap();
        assert_eq!(started.reply.status, AuthStatus::Accepted);
        assert_ne!(started.transaction_id, INVALID_ID);

        let tx = f.repos.transactions().find_by_id(started.transaction_id).await.unwrap().unwrap();
        assert!(tx.status.is_open());
        assert_eq!(tag_status(&f.repos, "ABC123").await, (AuthStatus::ConcurrentTx, AuthStatus::ConcurrentTx));
    }
}
