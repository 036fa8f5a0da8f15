//! Unified OCPP WebSocket server
//!
//! Accepts station connections at `ws://<host>:<port>/{prefix}/{stationId}`.
//! The path and the subprotocol are checked inside the handshake; credentials
//! are checked right after the upgrade, before the session is registered.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::WebSocketStream;
use tracing::{error, info, warn};

use super::auth::{HandshakeCredentials, StationAuthenticator};
use super::negotiator::{Negotiated, ProtocolAdapters, ProtocolNegotiator};
use super::session::{Session, SessionServices};
use crate::application::session::Connection;
use crate::support::shutdown::ShutdownSignal;

const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// Listener settings taken from `[server]` and `[security]`.
#[derive(Debug, Clone)]
pub struct OcppServerConfig {
    pub address: String,
    pub path_prefix: String,
    pub client_cert_header: String,
}

/// OCPP WebSocket Server
pub struct OcppServer {
    config: OcppServerConfig,
    adapters: Arc<ProtocolAdapters>,
    negotiator: Arc<ProtocolNegotiator>,
    authenticator: Arc<StationAuthenticator>,
    services: Arc<SessionServices>,
    shutdown: ShutdownSignal,
}

/// Extract the station id from `/{prefix}/{stationId}`. The prefix matches
/// case-insensitively; the id must be a single non-empty segment.
pub fn extract_station_id(path: &str, prefix: &str) -> Option<String> {
    let path = path.trim_start_matches('/');
    let prefix = prefix.trim_matches('/');
    if path.len() <= prefix.len() || !path.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, rest) = path.split_at(prefix.len());
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let id = rest.strip_prefix('/')?.trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

fn refuse(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// What the handshake callback learned about the connecting station.
#[derive(Debug, Default)]
struct Handshake {
    station_id: Option<String>,
    negotiated: Option<Negotiated>,
    credentials: HandshakeCredentials,
}

impl OcppServer {
    pub fn new(
        config: OcppServerConfig,
        adapters: Arc<ProtocolAdapters>,
        authenticator: Arc<StationAuthenticator>,
        services: Arc<SessionServices>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let negotiator = Arc::new(adapters.build_negotiator());
        Self {
            config,
            adapters,
            negotiator,
            authenticator,
            services,
            shutdown,
        }
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(&self.config.address).await
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections until the shutdown signal fires, then wait for
    /// the live sessions to close.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => {
                info!(
                    subprotocols = ?self.negotiator.supported_subprotocols(),
                    "OCPP Central System listening on ws://{}/{}/{{station_id}}",
                    addr,
                    self.config.path_prefix.trim_matches('/')
                );
            }
            Err(e) => warn!(error = %e, "Listener address unavailable"),
        }

        let mut sessions = JoinSet::new();
        let shutdown_wait = self.shutdown.notified().wait();
        tokio::pin!(shutdown_wait);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let server = self.clone();
                        sessions.spawn(async move {
                            server.handle_connection(stream, addr).await;
                        });
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!(error = %e, "Connection task panicked");
                    }
                }
                _ = &mut shutdown_wait => {
                    info!("WebSocket server received shutdown signal");
                    break;
                }
            }
        }

        drop(listener);
        let drained = self.services.registry.drain();
        info!(sessions = drained.len(), "Closing live sessions");
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "Connection task panicked");
            }
        }
        info!("WebSocket server shutdown complete");
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let mut handshake = Handshake::default();
        let prefix = self.config.path_prefix.clone();
        let cert_header = self.config.client_cert_header.clone();
        let negotiator = self.negotiator.clone();

        let callback = |req: &Request, mut response: Response| {
            let path = req.uri().path();
            let Some(station_id) = extract_station_id(path, &prefix) else {
                warn!(%addr, path, "Rejected handshake: unknown path");
                return Err(refuse(StatusCode::NOT_FOUND, "Unknown path"));
            };

            let offered = req
                .headers()
                .get(SUBPROTOCOL_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            let Some(negotiated) = negotiator.negotiate(offered) else {
                warn!(
                    charge_point_id = station_id.as_str(),
                    offered, "Rejected handshake: no supported subprotocol"
                );
                return Err(refuse(StatusCode::BAD_REQUEST, "Unsupported subprotocol"));
            };
            response
                .headers_mut()
                .insert(SUBPROTOCOL_HEADER, HeaderValue::from_static(negotiated.token));

            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            handshake.credentials = HandshakeCredentials {
                authorization: header("Authorization"),
                client_cert: header(cert_header.as_str()),
            };
            handshake.station_id = Some(station_id);
            handshake.negotiated = Some(negotiated);
            Ok(response)
        };

        let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%addr, error = %e, "WebSocket handshake failed");
                return;
            }
        };
        let (Some(station_id), Some(negotiated)) = (handshake.station_id, handshake.negotiated)
        else {
            return;
        };
        info!(
            charge_point_id = station_id.as_str(),
            %addr,
            version = %negotiated.version,
            subprotocol = negotiated.token,
            "Station connected"
        );

        if let Err(e) = self
            .authenticator
            .authenticate(&station_id, &handshake.credentials)
            .await
        {
            warn!(charge_point_id = station_id.as_str(), error = %e, "Station authentication failed");
            close_with_policy(ws, "authentication failed").await;
            return;
        }

        let (tx, outbox) = mpsc::unbounded_channel();
        let connection = Connection::new(station_id.clone(), negotiated.version, tx);
        let connection_id = connection.connection_id;

        let Some(handler) =
            self.adapters
                .create_handler(negotiated.version, station_id.clone(), connection.live.clone())
        else {
            error!(charge_point_id = station_id.as_str(), version = %negotiated.version, "No handler registered");
            close_with_policy(ws, "unsupported version").await;
            return;
        };

        if let Err(e) = self.services.registry.register(connection.clone()) {
            warn!(charge_point_id = station_id.as_str(), error = %e, "Connection refused");
            close_with_policy(ws, "already connected").await;
            return;
        }

        Session::new(handler, connection, self.services.clone())
            .run(ws, outbox, self.shutdown.clone())
            .await;

        if self.services.registry.unregister(&station_id, connection_id) {
            self.services.correlator.cleanup_station(&station_id);
        }
        info!(charge_point_id = station_id.as_str(), "Station disconnected");
    }
}

async fn close_with_policy<S>(mut ws: WebSocketStream<S>, reason: &str)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: reason.to_string().into(),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        warn!(error = %e, "Close handshake failed");
    }
}
