//! Answer handling for server-initiated calls
//!
//! Completes the persisted command from the station's answer, runs the
//! remote start/stop follow-ups and finally releases a blocked caller.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use super::{Answer, Correlator};
use crate::application::transactions::{StartRequest, StopRequest, TransactionService};
use crate::domain::{
    CommandStatus, CommandType, DomainResult, OcppVersion, OutboundCommand, ProtocolHandler,
    RepositoryProvider,
};

const REMOTE_STOP_REASON: &str = "Remote";

/// Connector and tag of a remote start. The command's own fields win over
/// the request payload.
fn remote_start_target(version: OcppVersion, command: &OutboundCommand) -> (Option<i32>, Option<String>) {
    let (connector_key, tag_pointer) = match version {
        OcppVersion::V16 => ("connectorId", "/idTag"),
        OcppVersion::V201 => ("evseId", "/idToken/idToken"),
    };
    let connector = command.connector_id.or_else(|| {
        command
            .payload
            .get(connector_key)
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
    });
    let tag = command.tag_id.clone().or_else(|| {
        command
            .payload
            .pointer(tag_pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    (connector, tag)
}

pub struct CommandCompletion {
    repos: Arc<dyn RepositoryProvider>,
    correlator: Arc<Correlator>,
    transactions: Arc<TransactionService>,
    remote_stop_max_meter_age: Duration,
}

impl CommandCompletion {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        correlator: Arc<Correlator>,
        transactions: Arc<TransactionService>,
        remote_stop_max_meter_age_secs: i64,
    ) -> Self {
        Self {
            repos,
            correlator,
            transactions,
            remote_stop_max_meter_age: Duration::seconds(remote_stop_max_meter_age_secs),
        }
    }

    /// Handle a CallResult or CallError. Returns the command's final status,
    /// or `None` when the answer matched nothing we track.
    pub async fn on_answer(
        &self,
        handler: &dyn ProtocolHandler,
        unique_id: &str,
        answer: Answer,
    ) -> DomainResult<Option<CommandStatus>> {
        let station_id = handler.station_id();
        let Some(pending) = self.correlator.take(station_id, unique_id) else {
            warn!(
                charge_point_id = station_id,
                message_id = unique_id,
                "Answer for unknown or expired request, dropped"
            );
            return Ok(None);
        };

        let Some(command) = self.repos.commands().find_by_uid(unique_id).await? else {
            pending.resolve(answer);
            return Ok(None);
        };

        let status = match &answer {
            Answer::Result(payload) => handler.answer_status(command.command_type, payload),
            Answer::Error { .. } => CommandStatus::Failed,
        };
        let recorded = self
            .repos
            .commands()
            .complete(unique_id, status, Some(answer.summary()), Utc::now())
            .await?;
        if !recorded {
            warn!(
                charge_point_id = station_id,
                message_id = unique_id,
                "Command was no longer awaiting an answer"
            );
        }
        info!(
            charge_point_id = station_id,
            command = command.command_type.as_str(),
            message_id = unique_id,
            status = %status,
            "Command answered"
        );

        if recorded && status == CommandStatus::Completed {
            if let Err(e) = self.follow_up(handler.version(), &command).await {
                error!(
                    charge_point_id = station_id,
                    message_id = unique_id,
                    error = %e,
                    "Command follow-up failed"
                );
            }
        }

        pending.resolve(answer);
        Ok(Some(status))
    }

    async fn follow_up(&self, version: OcppVersion, command: &OutboundCommand) -> DomainResult<()> {
        match command.command_type {
            CommandType::RemoteStartTransaction => self.synthesize_start(version, command).await,
            CommandType::RemoteStopTransaction => self.synthesize_stop(version, command).await,
            _ => Ok(()),
        }
    }

    async fn synthesize_start(&self, version: OcppVersion, command: &OutboundCommand) -> DomainResult<()> {
        let station_id = command.station_id.as_str();
        let (Some(connector_id), Some(tag)) = remote_start_target(version, command) else {
            warn!(
                charge_point_id = station_id,
                uid = command.uid.as_str(),
                "Remote start without connector or tag, no transaction started"
            );
            return Ok(());
        };
        let Some(connector) = self.repos.connectors().find(station_id, connector_id).await? else {
            warn!(
                charge_point_id = station_id,
                connector_id,
                "Remote start on unknown connector, no transaction started"
            );
            return Ok(());
        };

        let meter_kwh = connector.last_meter.unwrap_or(0.0);
        let outcome = self
            .transactions
            .start(
                station_id,
                StartRequest {
                    connector_id,
                    tag_identifier: tag,
                    meter_start: (meter_kwh * 1000.0).round() as i64,
                    timestamp: connector.last_meter_time.unwrap_or_else(Utc::now),
                    device_uid: None,
                },
            )
            .await?;
        info!(
            charge_point_id = station_id,
            connector_id,
            transaction_id = outcome.transaction_id,
            status = %outcome.reply.status,
            "Remote start applied"
        );
        Ok(())
    }

    async fn synthesize_stop(&self, version: OcppVersion, command: &OutboundCommand) -> DomainResult<()> {
        let station_id = command.station_id.as_str();
        let transactions = self.repos.transactions();
        let requested = command.payload.get("transactionId");
        let tx = match (version, requested) {
            (OcppVersion::V201, Some(Value::String(uid))) => {
                transactions.find_by_device_uid(station_id, uid).await?
            }
            (_, Some(Value::Number(n))) => match n.as_i64() {
                Some(id) => transactions.find_by_id(id as i32).await?,
                None => None,
            },
            (_, Some(Value::String(s))) => match s.parse::<i32>() {
                Ok(id) => transactions.find_by_id(id).await?,
                Err(_) => None,
            },
            _ => None,
        };
        let Some(tx) = tx else {
            warn!(
                charge_point_id = station_id,
                uid = command.uid.as_str(),
                "Remote stop names no known transaction"
            );
            return Ok(());
        };

        let connector = self.repos.connectors().find(station_id, tx.connector_id).await?;
        let fresh_meter = connector.and_then(|c| match (c.last_meter, c.last_meter_time) {
            (Some(meter), Some(at)) if Utc::now() - at <= self.remote_stop_max_meter_age => Some(meter),
            _ => None,
        });
        let Some(meter_kwh) = fresh_meter else {
            warn!(
                charge_point_id = station_id,
                transaction_id = tx.id,
                "Last meter too old for a remote stop, waiting for the station's own stop"
            );
            return Ok(());
        };

        let outcome = self
            .transactions
            .stop(
                station_id,
                StopRequest {
                    transaction_id: tx.id,
                    tag_identifier: command.tag_id.clone(),
                    meter_stop: (meter_kwh * 1000.0).round() as i64,
                    timestamp: Utc::now(),
                    reason: Some(REMOTE_STOP_REASON.to_string()),
                    transaction_data: None,
                },
            )
            .await?;
        info!(
            charge_point_id = station_id,
            transaction_id = tx.id,
            status = %outcome.reply.status,
            "Remote stop applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::authorization::TagResolver;
    use crate::application::commands::answer_status;
    use crate::application::connectors::ConnectorTracker;
    use crate::domain::{
        ChargeTag, ConnectorUpdate, NewCommand, ProtocolError, Station, TransactionStatus,
    };
    use crate::infrastructure::InMemoryRepositoryProvider;
    use async_trait::async_trait;
    use serde_json::json;

    struct StubHandler;

    #[async_trait]
    impl ProtocolHandler for StubHandler {
        async fn handle_call(&self, action: &str, _payload: Value) -> Result<Value, ProtocolError> {
            Err(ProtocolError::NotSupported(action.to_string()))
        }

        fn version(&self) -> OcppVersion {
            OcppVersion::V16
        }

        fn station_id(&self) -> &str {
            "CP1"
        }

        fn answer_status(&self, command: CommandType, payload: &Value) -> CommandStatus {
            answer_status(OcppVersion::V16, command, payload)
        }
    }

    struct Fixture {
        repos: Arc<InMemoryRepositoryProvider>,
        correlator: Arc<Correlator>,
        transactions: Arc<TransactionService>,
        completion: CommandCompletion,
    }

    async fn fixture() -> Fixture {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.stations().save(Station::new("CP1")).await.unwrap();
        repos.charge_tags().create(ChargeTag::new("ABC123")).await.unwrap();
        let correlator = Arc::new(Correlator::new());
        let resolver = Arc::new(TagResolver::new(repos.clone(), true));
        let tracker = Arc::new(ConnectorTracker::new(repos.clone()));
        let transactions = Arc::new(TransactionService::new(repos.clone(), resolver, tracker, 5));
        let completion = CommandCompletion::new(repos.clone(), correlator.clone(), transactions.clone(), 30);
        Fixture {
            repos,
            correlator,
            transactions,
            completion,
        }
    }

    async fn sent(f: &Fixture, command: NewCommand) {
        let (uid, kind) = (command.uid.clone(), command.command_type);
        f.repos.commands().create(command).await.unwrap();
        f.repos
            .commands()
            .transition(&uid, CommandStatus::Queued, CommandStatus::Sent, Utc::now())
            .await
            .unwrap();
        f.correlator.track("CP1", &uid, kind.as_str(), Some(kind), Value::Null);
    }

    async fn sent_command(f: &Fixture, uid: &str, kind: CommandType, payload: Value) {
        sent(
            f,
            NewCommand {
                uid: uid.into(),
                station_id: "CP1".into(),
                connector_id: Some(1),
                tag_id: Some("ABC123".into()),
                command_type: kind,
                payload,
            },
        )
        .await;
    }

    fn bare_remote_start(payload: Value) -> OutboundCommand {
        NewCommand {
            uid: "rs".into(),
            station_id: "CP1".into(),
            connector_id: None,
            tag_id: None,
            command_type: CommandType::RemoteStartTransaction,
            payload,
        }
        .into_command(1, Utc::now())
    }

    #[tokio::test]
    async fn accepted_remote_start_opens_transaction_from_last_meter() {
        let f = fixture().await;
        f.repos
            .connectors()
            .upsert("CP1", 1, &ConnectorUpdate::meter(2.5, Some(Utc::now())))
            .await
            .unwrap();
        sent_command(&f, "rs1", CommandType::RemoteStartTransaction, json!({})).await;

        let status = f
            .completion
            .on_answer(&StubHandler, "rs1", Answer::Result(json!({"status": "Accepted"})))
            .await
            .unwrap();
        assert_eq!(status, Some(CommandStatus::Completed));

        let tx = f
            .repos
            .transactions()
            .latest_started("CP1", 1, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.start_tag_id, "ABC123");
        assert!((tx.meter_start - 2.5).abs() < 1e-9);

        // The station's own StartTransaction afterwards reuses the session
        let again = f
            .transactions
            .start(
                "CP1",
                StartRequest {
                    connector_id: 1,
                    tag_identifier: "ABC123".into(),
                    meter_start: 2500,
                    timestamp: Utc::now(),
                    device_uid: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(again.transaction_id, tx.id);
    }

    #[tokio::test]
    async fn remote_start_reads_connector_and_tag_from_payload() {
        let f = fixture().await;
        f.repos
            .connectors()
            .upsert("CP1", 1, &ConnectorUpdate::meter(2.5, Some(Utc::now())))
            .await
            .unwrap();
        sent(
            &f,
            NewCommand {
                uid: "rs3".into(),
                station_id: "CP1".into(),
                connector_id: None,
                tag_id: None,
                command_type: CommandType::RemoteStartTransaction,
                payload: json!({"connectorId": 1, "idTag": "ABC123"}),
            },
        )
        .await;

        let status = f
            .completion
            .on_answer(&StubHandler, "rs3", Answer::Result(json!({"status": "Accepted"})))
            .await
            .unwrap();
        assert_eq!(status, Some(CommandStatus::Completed));

        let started = f.repos.transactions().list_for_connector("CP1", 1).await.unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].start_tag_id, "ABC123");
        assert_eq!(started[0].status, TransactionStatus::Started);
    }

    #[test]
    fn remote_start_target_follows_version() {
        let v16 = bare_remote_start(json!({"connectorId": 2, "idTag": "ABC123"}));
        assert_eq!(
            remote_start_target(OcppVersion::V16, &v16),
            (Some(2), Some("ABC123".to_string()))
        );

        let v201 = bare_remote_start(json!({
            "evseId": 3,
            "remoteStartId": 1,
            "idToken": {"idToken": "ABC123", "type": "Central"}
        }));
        assert_eq!(
            remote_start_target(OcppVersion::V201, &v201),
            (Some(3), Some("ABC123".to_string()))
        );
        // 1.6 keys mean nothing to a 2.0.1 station
        assert_eq!(remote_start_target(OcppVersion::V201, &v16), (None, None));

        let mut explicit = bare_remote_start(json!({"connectorId": 2, "idTag": "OTHER"}));
        explicit.connector_id = Some(1);
        explicit.tag_id = Some("ABC123".into());
        assert_eq!(
            remote_start_target(OcppVersion::V16, &explicit),
            (Some(1), Some("ABC123".to_string()))
        );
    }

    #[tokio::test]
    async fn rejected_remote_start_fails_without_transaction() {
        let f = fixture().await;
        sent_command(&f, "rs2", CommandType::RemoteStartTransaction, json!({})).await;

        let status = f
            .completion
            .on_answer(&StubHandler, "rs2", Answer::Result(json!({"status": "Rejected"})))
            .await
            .unwrap();
        assert_eq!(status, Some(CommandStatus::Failed));
        assert!(f.repos.transactions().list_for_connector("CP1", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn call_error_fails_command() {
        let f = fixture().await;
        sent_command(&f, "r1", CommandType::Reset, json!({"type": "Soft"})).await;
        let status = f
            .completion
            .on_answer(
                &StubHandler,
                "r1",
                Answer::Error {
                    code: "NotImplemented".into(),
                    description: "no".into(),
                    details: json!({}),
                },
            )
            .await
            .unwrap();
        assert_eq!(status, Some(CommandStatus::Failed));
        let cmd = f.repos.commands().find_by_uid("r1").await.unwrap().unwrap();
        assert_eq!(cmd.result.as_deref(), Some("NotImplemented: no"));
    }

    #[tokio::test]
    async fn unmatched_answer_is_dropped() {
        let f = fixture().await;
        let status = f
            .completion
            .on_answer(&StubHandler, "ghost", Answer::Result(json!({"status": "Accepted"})))
            .await
            .unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn remote_stop_with_stale_meter_leaves_transaction_open() {
        let f = fixture().await;
        let started = f
            .transactions
            .start(
                "CP1",
                StartRequest {
                    connector_id: 1,
                    tag_identifier: "ABC123".into(),
                    meter_start: 0,
                    timestamp: Utc::now(),
                    device_uid: None,
                },
            )
            .await
            .unwrap();
        let stale = Utc::now() - Duration::minutes(10);
        f.repos
            .connectors()
            .upsert("CP1", 1, &ConnectorUpdate::meter(3.0, Some(stale)))
            .await
            .unwrap();
        sent_command(
            &f,
            "stop1",
            CommandType::RemoteStopTransaction,
            json!({"transactionId": started.transaction_id}),
        )
        .await;

        let status = f
            .completion
            .on_answer(&StubHandler, "stop1", Answer::Result(json!({"status": "Accepted"})))
            .await
            .unwrap();
        assert_eq!(status, Some(CommandStatus::Completed));
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
    async fn remote_stop_with_fresh_meter_closes_transaction() {
        let f = fixture().await;
        let started = f
            .transactions
            .start(
                "CP1",
                StartRequest {
                    connector_id: 1,
                    tag_identifier: "ABC123".into(),
                    meter_start: 1000,
                    timestamp: Utc::now(),
                    device_uid: None,
                },
            )
            .await
            .unwrap();
        f.repos
            .connectors()
            .upsert("CP1", 1, &ConnectorUpdate::meter(6.0, Some(Utc::now())))
            .await
            .unwrap();
        sent_command(
            &f,
            "stop2",
            CommandType::RemoteStopTransaction,
            json!({"transactionId": started.transaction_id}),
        )
        .await;

        f.completion
            .on_answer(&StubHandler, "stop2", Answer::Result(json!({"status": "Accepted"})))
            .await
            .unwrap();
        let tx = f
            .repos
            .transactions()
            .find_by_id(started.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.stop_reason.as_deref(), Some(REMOTE_STOP_REASON));
        assert_eq!(tx.energy_kwh(), Some(5.0));
    }
}
