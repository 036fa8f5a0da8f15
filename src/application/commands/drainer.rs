//! Outbound command queue drainer

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::{wire_payload, Correlator};
use crate::application::session::Connection;
use crate::domain::{CommandStatus, DomainResult, ProtocolHandler, RepositoryProvider};
use crate::support::ocpp_frame::OcppFrame;

pub struct CommandDrainer {
    repos: Arc<dyn RepositoryProvider>,
    correlator: Arc<Correlator>,
}

impl CommandDrainer {
    pub fn new(repos: Arc<dyn RepositoryProvider>, correlator: Arc<Correlator>) -> Self {
        Self { repos, correlator }
    }

    /// Transmit every `Queued` command of the connection's station.
    ///
    /// A command moves to `Sent` before it is written, so a concurrent drain
    /// skips it. Returns the number of calls transmitted.
    pub async fn drain(&self, handler: &dyn ProtocolHandler, connection: &Connection) -> DomainResult<usize> {
        let station_id = connection.station_id.as_str();
        let commands = self.repos.commands();
        let due = commands.due_for_station(station_id).await?;
        let mut sent = 0;

        for command in due {
            let now = Utc::now();
            if !commands
                .transition(&command.uid, CommandStatus::Queued, CommandStatus::Sent, now)
                .await?
            {
                // Cancelled or picked up elsewhere
                continue;
            }

            let action = handler.command_action(command.command_type);
            let frame = OcppFrame::Call {
                unique_id: command.uid.clone(),
                action: action.to_string(),
                payload: wire_payload(connection.version, &command),
            };
            self.correlator.track(
                station_id,
                &command.uid,
                action,
                Some(command.command_type),
                frame.to_value(),
            );

            let text = frame.serialize();
            info!("[{}] -> {}", station_id, text);
            if let Err(e) = connection.send(text) {
                error!(
                    charge_point_id = station_id,
                    message_id = command.uid.as_str(),
                    error = %e,
                    "Failed to transmit command"
                );
                self.correlator.take(station_id, &command.uid);
                commands
                    .complete(&command.uid, CommandStatus::Failed, Some(e.to_string()), Utc::now())
                    .await?;
                warn!(charge_point_id = station_id, "Stopping drain, connection closed");
                break;
            }
            metrics::counter!("ocpp_messages_total", "direction" => "out", "action" => action).increment(1);
            sent += 1;
        }
        Ok(sent)
    }
}
