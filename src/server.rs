//! Reusable OCPP Central System server runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! storage init and migrations, the OCPP WebSocket server, the correlation
//! sweeper, metrics, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::{debug, error, info, warn};

use crate::application::authorization::TagResolver;
use crate::application::commands::{CommandCompletion, CommandDispatcher, CommandDrainer, Correlator};
use crate::application::connectors::ConnectorTracker;
use crate::application::handlers::ChargingServices;
use crate::application::message_log::MessageLogger;
use crate::application::session::{SessionRegistry, SharedSessionRegistry};
use crate::application::transactions::TransactionService;
use crate::config::{AppConfig, StorageBackend};
use crate::domain::RepositoryProvider;
use crate::infrastructure::{init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};
use crate::interfaces::ws::{
    OcppServer, OcppServerConfig, ProtocolAdapters, SessionServices, StationAuthenticator,
    V16AdapterFactory, V201AdapterFactory,
};
use crate::support::errors::{AppError, InfraError};
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Handle to a running OCPP Central System.
///
/// # Examples
///
/// ```rust,no_run
/// use ocpp_core::config::AppConfig;
/// use ocpp_core::server::ServerHandle;
///
/// #[tokio::main]
/// async fn main() -> Result<(), ocpp_core::support::errors::AppError> {
///     let handle = ServerHandle::start(AppConfig::default()).await?;
///     handle.install_signal_handler();
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    /// Active WebSocket session registry.
    pub session_registry: SharedSessionRegistry,
    /// Administrative command surface.
    pub command_dispatcher: Arc<CommandDispatcher>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Address the OCPP listener is bound to.
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    ws_task: tokio::task::JoinHandle<()>,
}

/// The global metrics recorder can only be installed once per process.
static METRICS_INSTALLED: OnceLock<bool> = OnceLock::new();

fn install_metrics_exporter(config: &AppConfig) {
    if !config.metrics.enabled {
        return;
    }
    let installed = METRICS_INSTALLED.get_or_init(|| {
        let addr: SocketAddr = match config.metrics.listen.parse() {
            Ok(addr) => addr,
            Err(e) => {
                error!(listen = config.metrics.listen.as_str(), error = %e, "Invalid metrics listen address");
                return false;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                info!("Prometheus exporter listening on http://{}/metrics", addr);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to install Prometheus exporter");
                false
            }
        }
    });
    debug!(installed = *installed, "Metrics exporter state");
}

async fn open_storage(
    config: &AppConfig,
) -> Result<(Arc<dyn RepositoryProvider>, Option<DatabaseConnection>), AppError> {
    match config.database.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            Ok((Arc::new(InMemoryRepositoryProvider::new()), None))
        }
        StorageBackend::Sqlite => {
            let db_config = DatabaseConfig {
                url: config.database.url.clone(),
            };
            let db = init_database(&db_config).await.map_err(InfraError::from)?;
            Ok((Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db)))
        }
    }
}

/// Periodically drop correlations nobody will ever answer.
fn spawn_correlation_sweeper(correlator: Arc<Correlator>, response_timeout: Duration, shutdown: ShutdownSignal) {
    let max_age = response_timeout * 2;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(response_timeout);
        let shutdown_wait = shutdown.notified().wait();
        tokio::pin!(shutdown_wait);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = correlator.purge_expired(max_age);
                    if purged > 0 {
                        warn!(purged, "Expired pending correlations dropped");
                    }
                }
                _ = &mut shutdown_wait => break,
            }
        }
    });
}

impl ServerHandle {
    /// Start the OCPP Central System.
    ///
    /// This will:
    /// 1. Install the Prometheus exporter (if enabled)
    /// 2. Open storage and run migrations
    /// 3. Wire the application services
    /// 4. Bind and start the OCPP WebSocket server
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        info!("Starting OCPP Central System...");

        install_metrics_exporter(&config);
        let (repos, db) = open_storage(&config).await?;

        let resolver = Arc::new(TagResolver::new(repos.clone(), config.authorization.implicit_grants));
        let tracker = Arc::new(ConnectorTracker::new(repos.clone()));
        let transactions = Arc::new(TransactionService::new(
            repos.clone(),
            resolver,
            tracker.clone(),
            config.authorization.default_expiry_minutes,
        ));
        let charging = Arc::new(ChargingServices {
            repos: repos.clone(),
            tracker,
            transactions: transactions.clone(),
            heartbeat_interval: config.server.heartbeat_interval,
        });

        let registry: SharedSessionRegistry = Arc::new(SessionRegistry::new());
        let correlator = Arc::new(Correlator::new());
        let response_timeout = Duration::from_secs(config.commands.response_timeout_secs);
        let command_dispatcher = Arc::new(CommandDispatcher::new(
            repos.clone(),
            registry.clone(),
            correlator.clone(),
            response_timeout,
        ));
        let services = Arc::new(SessionServices {
            registry: registry.clone(),
            correlator: correlator.clone(),
            drainer: Arc::new(CommandDrainer::new(repos.clone(), correlator.clone())),
            completion: Arc::new(CommandCompletion::new(
                repos.clone(),
                correlator.clone(),
                transactions,
                config.commands.remote_stop_max_meter_age_secs,
            )),
            message_log: MessageLogger::new(repos.clone(), config.logging.message_log_level),
        });

        let mut adapters = ProtocolAdapters::new();
        adapters.register(Arc::new(V201AdapterFactory::new(charging.clone())));
        adapters.register(Arc::new(V16AdapterFactory::new(charging)));

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout_secs);
        let signal = shutdown.signal();

        let server = Arc::new(OcppServer::new(
            OcppServerConfig {
                address: config.server.address(),
                path_prefix: config.server.path_prefix.clone(),
                client_cert_header: config.security.client_cert_header.clone(),
            },
            Arc::new(adapters),
            Arc::new(StationAuthenticator::new(
                repos.clone(),
                config.security.require_authentication,
            )),
            services,
            signal.clone(),
        ));
        let listener = server.bind().await?;
        let local_addr = listener.local_addr()?;

        spawn_correlation_sweeper(correlator, response_timeout, signal);
        let ws_task = tokio::spawn(server.serve(listener));

        Ok(Self {
            repos,
            session_registry: registry,
            command_dispatcher,
            config,
            local_addr,
            db,
            shutdown,
            ws_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.ws_task.is_finished()
    }

    /// Wait for the shutdown signal, then for the server to stop within the
    /// configured timeout.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            ws_task,
            ..
        } = self;

        let finished = shutdown
            .shutdown_with_cleanup(|| async move {
                match ws_task.await {
                    Ok(()) => info!("WebSocket server stopped"),
                    Err(e) => error!(error = %e, "WebSocket server task panicked"),
                }
            })
            .await;
        if !finished {
            warn!("Sessions still open after shutdown timeout");
        }

        if let Some(db) = db {
            if let Err(e) = db.close().await {
                warn!(error = %e, "Error closing database connection");
            } else {
                info!("Database connection closed");
            }
        }
        info!("OCPP Central System shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down OCPP Central System...");
        self.trigger_shutdown();
        self.wait().await;
    }
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
