//! Per-connection session loop
//!
//! One task per station socket. It reads frames, answers Calls through the
//! version's [`ProtocolHandler`], routes CallResult/CallError to the
//! correlator and drains queued commands after every inbound message and
//! whenever the dispatcher wakes it.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::application::commands::{Answer, CommandCompletion, CommandDrainer, Correlator};
use crate::application::message_log::MessageLogger;
use crate::application::session::{Connection, SharedSessionRegistry};
use crate::domain::{Direction, OcppVersion, ProtocolHandler};
use crate::support::ocpp_frame::{OcppFrame, OcppFrameError};
use crate::support::shutdown::ShutdownSignal;

/// Shared by every session of the server.
pub struct SessionServices {
    pub registry: SharedSessionRegistry,
    pub correlator: Arc<Correlator>,
    pub drainer: Arc<CommandDrainer>,
    pub completion: Arc<CommandCompletion>,
    pub message_log: MessageLogger,
}

/// Error code for a frame that could not be parsed but has a readable id.
fn frame_error_code(version: OcppVersion, err: &OcppFrameError) -> &'static str {
    match version {
        OcppVersion::V16 => "FormationViolation",
        OcppVersion::V201 if err.is_message_type_error() => "ProtocolError",
        OcppVersion::V201 => "FormatViolation",
    }
}

fn connector_of(payload: &Value) -> Option<i32> {
    payload
        .get("connectorId")
        .or_else(|| payload.get("evseId"))
        .and_then(Value::as_i64)
        .map(|id| id as i32)
}

pub struct Session {
    handler: Box<dyn ProtocolHandler>,
    connection: Connection,
    services: Arc<SessionServices>,
}

impl Session {
    pub fn new(handler: Box<dyn ProtocolHandler>, connection: Connection, services: Arc<SessionServices>) -> Self {
        Self {
            handler,
            connection,
            services,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.connection.station_id
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Process one inbound text message. Returns the frame to send back, if
    /// the message calls for one.
    pub async fn on_text(&self, text: &str) -> Option<String> {
        let station_id = self.station_id();
        info!("[{}] <- {}", station_id, text);
        self.services.registry.touch(station_id);

        let frame = match OcppFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => return self.on_bad_frame(text, e),
        };

        match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => Some(self.on_call(unique_id, action, payload).await),
            OcppFrame::CallResult { unique_id, payload } => {
                self.on_answer(&unique_id, Answer::Result(payload)).await;
                None
            }
            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => {
                self.on_answer(
                    &unique_id,
                    Answer::Error {
                        code: error_code,
                        description: error_description,
                        details: error_details,
                    },
                )
                .await;
                None
            }
        }
    }

    fn on_bad_frame(&self, text: &str, err: OcppFrameError) -> Option<String> {
        let station_id = self.station_id();
        let Some(unique_id) = OcppFrame::peek_unique_id(text) else {
            error!(charge_point_id = station_id, error = %err, "Unreadable frame dropped");
            return None;
        };
        warn!(
            charge_point_id = station_id,
            message_id = unique_id.as_str(),
            error = %err,
            "Malformed frame"
        );
        let code = frame_error_code(self.connection.version, &err);
        Some(OcppFrame::error_response(unique_id, code, err.to_string()).serialize())
    }

    async fn on_call(&self, unique_id: String, action: String, payload: Value) -> String {
        let station_id = self.station_id();
        let connector_id = connector_of(&payload);
        metrics::counter!("ocpp_messages_total", "direction" => "in", "action" => action.clone()).increment(1);

        let (frame, result, error_code) = match self.handler.handle_call(&action, payload).await {
            Ok(response) => {
                let result = response.to_string();
                (
                    OcppFrame::CallResult {
                        unique_id,
                        payload: response,
                    },
                    result,
                    None,
                )
            }
            Err(e) => {
                let code = e.code(self.connection.version);
                if matches!(e, crate::domain::ProtocolError::Internal(_)) {
                    error!(charge_point_id = station_id, action = action.as_str(), error = %e, "Handler failed");
                } else {
                    warn!(charge_point_id = station_id, action = action.as_str(), error = %e, "Call rejected");
                }
                (
                    OcppFrame::error_response(unique_id, code, e.to_string()),
                    e.to_string(),
                    Some(code.to_string()),
                )
            }
        };

        self.services.message_log.record(
            station_id,
            connector_id,
            &action,
            Some(result),
            error_code,
            Direction::Inbound,
        );
        frame.serialize()
    }

    async fn on_answer(&self, unique_id: &str, answer: Answer) {
        let station_id = self.station_id();
        let action = self.services.correlator.action_of(station_id, unique_id);
        let error_code = match &answer {
            Answer::Error { code, .. } => Some(code.clone()),
            Answer::Result(_) => None,
        };
        let summary = answer.summary();

        match self
            .services
            .completion
            .on_answer(self.handler.as_ref(), unique_id, answer)
            .await
        {
            Ok(status) => debug!(
                charge_point_id = station_id,
                message_id = unique_id,
                status = ?status,
                "Answer processed"
            ),
            Err(e) => error!(
                charge_point_id = station_id,
                message_id = unique_id,
                error = %e,
                "Failed to process answer"
            ),
        }

        if let Some(action) = action {
            self.services.message_log.record(
                station_id,
                None,
                &action,
                Some(summary),
                error_code,
                Direction::Outbound,
            );
        }
    }

    /// Queue a frame for the socket.
    fn respond(&self, text: String) {
        info!("[{}] -> {}", self.station_id(), text);
        if let Err(e) = self.connection.send(text) {
            error!(charge_point_id = self.station_id(), error = %e, "Failed to queue response");
        }
    }

    /// Transmit the station's queued commands.
    pub async fn drain(&self) {
        match self
            .services
            .drainer
            .drain(self.handler.as_ref(), &self.connection)
            .await
        {
            Ok(0) => {}
            Ok(sent) => debug!(charge_point_id = self.station_id(), sent, "Queued commands sent"),
            Err(e) => error!(charge_point_id = self.station_id(), error = %e, "Command drain failed"),
        }
    }

    /// Serve the socket until it closes or the server shuts down.
    ///
    /// `outbox` is the receiving end of the connection's sender. Errors in
    /// one message never end the session.
    pub async fn run<S>(
        self,
        ws: WebSocketStream<S>,
        mut outbox: mpsc::UnboundedReceiver<String>,
        shutdown: ShutdownSignal,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();
        let wake = self.connection.wake.clone();
        let shutdown_wait = shutdown.notified().wait();
        tokio::pin!(shutdown_wait);

        let close = loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.on_text(&text).await {
                            self.respond(reply);
                        }
                        self.drain().await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(charge_point_id = self.station_id(), bytes = data.len(), "Binary frame ignored");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(charge_point_id = self.station_id(), frame = ?frame, "Close received");
                        break None;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(charge_point_id = self.station_id(), error = %e, "WebSocket error");
                        break None;
                    }
                    None => break None,
                },
                Some(text) = outbox.recv() => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(charge_point_id = self.station_id(), error = %e, "Send failed");
                        break None;
                    }
                }
                _ = wake.notified() => self.drain().await,
                _ = &mut shutdown_wait => {
                    info!(charge_point_id = self.station_id(), "Closing session for shutdown");
                    break Some(CloseFrame {
                        code: CloseCode::Away,
                        reason: "server shutdown".into(),
                    });
                }
            }
        };

        // Flush what is already queued, e.g. the answer to the last call
        while let Ok(text) = outbox.try_recv() {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        if let Some(frame) = close {
            let _ = sink.send(Message::Close(Some(frame))).await;
        }
        let _ = sink.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::{CommandDispatcher, CommandRequest};
    use crate::application::handlers::test_support::{harness, Harness};
    use crate::application::handlers::{OcppHandlerV16, OcppHandlerV201};
    use crate::application::session::SessionRegistry;
    use crate::domain::{CommandStatus, CommandType, RepositoryProvider};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        h: Harness,
        session: Session,
        outbox: mpsc::UnboundedReceiver<String>,
        dispatcher: CommandDispatcher,
    }

    async fn fixture(version: OcppVersion) -> Fixture {
        let h = harness().await;
        let registry: SharedSessionRegistry = Arc::new(SessionRegistry::new());
        let correlator = Arc::new(Correlator::new());
        let (tx, outbox) = mpsc::unbounded_channel();
        let connection = Connection::new("CP1", version, tx);
        registry.register(connection.clone()).unwrap();

        let handler: Box<dyn ProtocolHandler> = match version {
            OcppVersion::V16 => Box::new(OcppHandlerV16::new("CP1", h.services.clone(), connection.live.clone())),
            OcppVersion::V201 => Box::new(OcppHandlerV201::new("CP1", h.services.clone(), connection.live.clone())),
        };
        let services = Arc::new(SessionServices {
            registry: registry.clone(),
            correlator: correlator.clone(),
            drainer: Arc::new(CommandDrainer::new(h.repos.clone(), correlator.clone())),
            completion: Arc::new(CommandCompletion::new(
                h.repos.clone(),
                correlator.clone(),
                h.services.transactions.clone(),
                30,
            )),
            message_log: MessageLogger::new(h.repos.clone(), 2),
        });
        let dispatcher = CommandDispatcher::new(h.repos.clone(), registry, correlator, Duration::from_millis(200));
        Fixture {
            h,
            session: Session::new(handler, connection, services),
            outbox,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn call_is_answered_with_same_id() {
        let f = fixture(OcppVersion::V16).await;
        let reply = f.session.on_text(r#"[2,"m1","Heartbeat",{}]"#).await.unwrap();
        match OcppFrame::parse(&reply).unwrap() {
            OcppFrame::CallResult { unique_id, payload } => {
                assert_eq!(unique_id, "m1");
                assert!(payload["currentTime"].is_string());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn handler_errors_become_call_errors() {
        let f = fixture(OcppVersion::V16).await;
        let reply = f.session.on_text(r#"[2,"m2","Foo",{}]"#).await.unwrap();
        assert!(reply.starts_with(r#"[4,"m2","NotSupported""#));

        let reply = f
            .session
            .on_text(r#"[2,"m3","StartTransaction",{"connectorId":"x"}]"#)
            .await
            .unwrap();
        assert!(reply.starts_with(r#"[4,"m3","FormationViolation""#));

        // The session keeps serving
        assert!(f.session.on_text(r#"[2,"m4","Heartbeat",{}]"#).await.is_some());
    }

    #[tokio::test]
    async fn malformed_frames() {
        let f = fixture(OcppVersion::V16).await;
        assert!(f.session.on_text("not json").await.is_none());
        let reply = f.session.on_text(r#"[9,"m5",{}]"#).await.unwrap();
        assert!(reply.starts_with(r#"[4,"m5","FormationViolation""#));

        let f = fixture(OcppVersion::V201).await;
        let reply = f.session.on_text(r#"[9,"m6",{}]"#).await.unwrap();
        assert!(reply.starts_with(r#"[4,"m6","ProtocolError""#));
        let reply = f.session.on_text(r#"[2,"m7","Heartbeat"]"#).await.unwrap();
        assert!(reply.starts_with(r#"[4,"m7","FormatViolation""#));
    }

    #[tokio::test]
    async fn queued_command_is_drained_and_completed() {
        let mut f = fixture(OcppVersion::V16).await;
        let uid = f
            .dispatcher
            .enqueue("CP1", CommandRequest::new(CommandType::Reset, json!({"type": "Soft"})))
            .await
            .unwrap();

        f.session.drain().await;
        let sent = f.outbox.try_recv().unwrap();
        match OcppFrame::parse(&sent).unwrap() {
            OcppFrame::Call {
                unique_id, action, ..
            } => {
                assert_eq!(unique_id, uid);
                assert_eq!(action, "Reset");
            }
            other => panic!("unexpected frame {:?}", other),
        }
        let command = f.h.repos.commands().find_by_uid(&uid).await.unwrap().unwrap();
        assert_eq!(command.status, CommandStatus::Sent);

        let answer = format!(r#"[3,"{}",{{"status":"Accepted"}}]"#, uid);
        assert!(f.session.on_text(&answer).await.is_none());
        let command = f.h.repos.commands().find_by_uid(&uid).await.unwrap().unwrap();
        assert_eq!(command.status, CommandStatus::Completed);

        // A second drain has nothing left to send
        f.session.drain().await;
        assert!(f.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn call_error_fails_command() {
        let mut f = fixture(OcppVersion::V16).await;
        let uid = f
            .dispatcher
            .enqueue("CP1", CommandRequest::new(CommandType::ClearCache, json!({})))
            .await
            .unwrap();
        f.session.drain().await;
        f.outbox.try_recv().unwrap();

        let answer = format!(r#"[4,"{}","InternalError","boom",{{}}]"#, uid);
        assert!(f.session.on_text(&answer).await.is_none());
        let command = f.h.repos.commands().find_by_uid(&uid).await.unwrap().unwrap();
        assert_eq!(command.status, CommandStatus::Failed);
    }

    #[tokio::test]
    async fn late_answer_is_dropped() {
        let f = fixture(OcppVersion::V16).await;
        assert!(f.session.on_text(r#"[3,"never-sent",{"status":"Accepted"}]"#).await.is_none());
        assert!(f.session.on_text(r#"[2,"m8","Heartbeat",{}]"#).await.is_some());
    }
}
