//! Administrative command surface
//!
//! Commands are persisted first and transmitted by the station's session
//! loop. `issue` additionally blocks until the answer or the timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Answer, CommandError, Correlator};
use crate::application::session::SharedSessionRegistry;
use crate::domain::{CommandStatus, CommandType, NewCommand, OutboundCommand, RepositoryProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub command_type: CommandType,
    pub connector_id: Option<i32>,
    pub tag_identifier: Option<String>,
    pub payload: Value,
}

impl CommandRequest {
    pub fn new(command_type: CommandType, payload: Value) -> Self {
        Self {
            command_type,
            connector_id: None,
            tag_identifier: None,
            payload,
        }
    }

    /// Build from a stored or user-supplied command name.
    pub fn named(name: &str, payload: Value) -> Result<Self, CommandError> {
        CommandType::parse(name)
            .map(|t| Self::new(t, payload))
            .ok_or_else(|| CommandError::UnsupportedCommand(name.to_string()))
    }

    pub fn with_connector(mut self, connector_id: i32) -> Self {
        self.connector_id = Some(connector_id);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_identifier = Some(tag.into());
        self
    }

    fn into_new_command(self, uid: String, station_id: &str) -> NewCommand {
        NewCommand {
            uid,
            station_id: station_id.to_string(),
            connector_id: self.connector_id,
            tag_id: self.tag_identifier,
            command_type: self.command_type,
            payload: self.payload,
        }
    }
}

pub struct CommandDispatcher {
    repos: Arc<dyn RepositoryProvider>,
    registry: SharedSessionRegistry,
    correlator: Arc<Correlator>,
    response_timeout: Duration,
}

fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

impl CommandDispatcher {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: SharedSessionRegistry,
        correlator: Arc<Correlator>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            repos,
            registry,
            correlator,
            response_timeout,
        }
    }

    /// Persist the command as `Queued` and wake the station if it is online.
    /// The returned uid is the correlation id of the eventual call.
    pub async fn enqueue(&self, station_id: &str, request: CommandRequest) -> Result<String, CommandError> {
        let command = self
            .repos
            .commands()
            .create(request.into_new_command(new_uid(), station_id))
            .await?;
        self.announce(&command);
        Ok(command.uid)
    }

    fn announce(&self, command: &OutboundCommand) {
        let online = self.registry.wake(&command.station_id);
        info!(
            charge_point_id = command.station_id.as_str(),
            command = command.command_type.as_str(),
            uid = command.uid.as_str(),
            online,
            "Command queued"
        );
    }

    /// Send a command and wait for the station's answer.
    ///
    /// On timeout a command that never left the queue is cancelled and one
    /// that was transmitted is failed.
    pub async fn issue(&self, station_id: &str, request: CommandRequest) -> Result<Value, CommandError> {
        if !self.registry.is_connected(station_id) {
            return Err(CommandError::NotConnected(station_id.to_string()));
        }

        let command_type = request.command_type;
        let uid = new_uid();
        let rx = self
            .correlator
            .register(station_id, &uid, command_type)
            .map_err(|e| CommandError::SendFailed(e.to_string()))?;

        let command = match self
            .repos
            .commands()
            .create(request.into_new_command(uid.clone(), station_id))
            .await
        {
            Ok(command) => command,
            Err(e) => {
                self.correlator.take(station_id, &uid);
                return Err(e.into());
            }
        };
        self.announce(&command);

        let started = Instant::now();
        let outcome = self
            .correlator
            .wait(station_id, &uid, rx, self.response_timeout)
            .await;
        metrics::histogram!("ocpp_command_latency_seconds", "action" => command_type.as_str())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Answer::Result(payload)) => Ok(payload),
            Ok(Answer::Error {
                code, description, ..
            }) => Err(CommandError::CallError { code, description }),
            Err(e) => {
                self.settle_unanswered(&uid).await;
                Err(e)
            }
        }
    }

    async fn settle_unanswered(&self, uid: &str) {
        let commands = self.repos.commands();
        let now = Utc::now();
        let result = match commands
            .transition(uid, CommandStatus::Queued, CommandStatus::Cancelled, now)
            .await
        {
            Ok(true) => Ok(CommandStatus::Cancelled),
            Ok(false) => commands
                .complete(uid, CommandStatus::Failed, Some("timeout".to_string()), now)
                .await
                .map(|_| CommandStatus::Failed),
            Err(e) => Err(e),
        };
        match result {
            Ok(status) => warn!(uid, status = %status, "Unanswered command settled"),
            Err(e) => warn!(uid, error = %e, "Failed to settle unanswered command"),
        }
    }

    /// Cancel a command that has not been transmitted yet.
    pub async fn cancel(&self, uid: &str) -> Result<bool, CommandError> {
        let cancelled = self
            .repos
            .commands()
            .transition(uid, CommandStatus::Queued, CommandStatus::Cancelled, Utc::now())
            .await?;
        info!(uid, cancelled, "Cancel command");
        Ok(cancelled)
    }

    pub async fn status(&self, uid: &str) -> Result<Option<CommandStatus>, CommandError> {
        Ok(self.repos.commands().find_by_uid(uid).await?.map(|c| c.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::{Connection, SessionRegistry};
    use crate::domain::{OcppVersion, Station};
    use crate::infrastructure::InMemoryRepositoryProvider;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        repos: Arc<InMemoryRepositoryProvider>,
        registry: SharedSessionRegistry,
        correlator: Arc<Correlator>,
        dispatcher: Arc<CommandDispatcher>,
    }

    async fn fixture(timeout: Duration) -> Fixture {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.stations().save(Station::new("CP1")).await.unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let correlator = Arc::new(Correlator::new());
        let dispatcher = Arc::new(CommandDispatcher::new(
            repos.clone(),
            registry.clone(),
            correlator.clone(),
            timeout,
        ));
        Fixture {
            repos,
            registry,
            correlator,
            dispatcher,
        }
    }

    fn connect(registry: &SessionRegistry) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(Connection::new("CP1", OcppVersion::V16, tx)).unwrap();
        rx
    }

    #[tokio::test]
    async fn enqueue_persists_queued_command_with_hex_uid() {
        let f = fixture(Duration::from_secs(1)).await;
        let uid = f
            .dispatcher
            .enqueue("CP1", CommandRequest::new(CommandType::ClearCache, json!({})))
            .await
            .unwrap();
        assert_eq!(uid.len(), 32);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(f.dispatcher.status(&uid).await.unwrap(), Some(CommandStatus::Queued));

        assert!(f.dispatcher.cancel(&uid).await.unwrap());
        assert_eq!(f.dispatcher.status(&uid).await.unwrap(), Some(CommandStatus::Cancelled));
        assert!(!f.dispatcher.cancel(&uid).await.unwrap());
    }

    #[tokio::test]
    async fn connector_and_tag_are_stored_with_the_command() {
        let f = fixture(Duration::from_secs(1)).await;
        let uid = f
            .dispatcher
            .enqueue(
                "CP1",
                CommandRequest::new(CommandType::RemoteStartTransaction, json!({}))
                    .with_connector(2)
                    .with_tag("ABC123"),
            )
            .await
            .unwrap();
        let stored = f.repos.commands().find_by_uid(&uid).await.unwrap().unwrap();
        assert_eq!(stored.connector_id, Some(2));
        assert_eq!(stored.tag_id.as_deref(), Some("ABC123"));
        assert_eq!(stored.command_type, CommandType::RemoteStartTransaction);
    }

    #[tokio::test]
    async fn issue_to_offline_station_fails_fast() {
        let f = fixture(Duration::from_secs(1)).await;
        let err = f
            .dispatcher
            .issue("CP1", CommandRequest::new(CommandType::Reset, json!({"type": "Soft"})))
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::NotConnected("CP1".into()));
    }

    #[tokio::test]
    async fn untransmitted_command_is_cancelled_on_timeout() {
        let f = fixture(Duration::from_millis(30)).await;
        let _rx = connect(&f.registry);

        let err = f
            .dispatcher
            .issue("CP1", CommandRequest::new(CommandType::Reset, json!({"type": "Soft"})))
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Timeout);

        let due = f.repos.commands().due_for_station("CP1").await.unwrap();
        assert!(due.is_empty());
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn answer_unblocks_issue() {
        let f = fixture(Duration::from_secs(2)).await;
        let _rx = connect(&f.registry);

        let dispatcher = f.dispatcher.clone();
        let call = tokio::spawn(async move {
            dispatcher
                .issue("CP1", CommandRequest::new(CommandType::ClearCache, json!({})))
                .await
        });

        // Stand in for the session loop: find the queued command and answer it
        let uid = loop {
            let due = f.repos.commands().due_for_station("CP1").await.unwrap();
            if let Some(cmd) = due.first() {
                break cmd.uid.clone();
            }
            tokio::task::yield_now().await;
        };
        let pending = f.correlator.take("CP1", &uid).unwrap();
        pending.resolve(Answer::Result(json!({"status": "Accepted"})));

        let payload = call.await.unwrap().unwrap();
        assert_eq!(payload, json!({"status": "Accepted"}));
    }

    #[test]
    fn unknown_command_name_is_rejected() {
        assert_eq!(
            CommandRequest::named("SelfDestruct", Value::Null),
            Err(CommandError::UnsupportedCommand("SelfDestruct".into()))
        );
        assert!(CommandRequest::named("Reset", Value::Null).is_ok());
    }
}
