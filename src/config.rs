//! Configuration module
//!
//! `AppConfig` is read from a TOML file. Every section and field has a
//! default, so a partial file or no file at all is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::support::errors::AppError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "OCPP_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseSettings,
    pub security: SecurityConfig,
    pub commands: CommandsConfig,
    pub authorization: AuthorizationConfig,
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Stations connect at `/{path_prefix}/{stationId}`
    pub path_prefix: String,
    /// Heartbeat interval in seconds, sent in BootNotification replies
    pub heartbeat_interval: i32,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            path_prefix: "ocpp".to_string(),
            heartbeat_interval: 300,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" or "json"
    pub format: String,
    /// 0 = off, 1 = all but the chatty actions, 2 = everything
    pub message_log_level: u8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            message_log_level: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub backend: StorageBackend,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://./ocpp-core.db?mode=rwc".to_string(),
            backend: StorageBackend::Sqlite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Reject stations that have neither credentials nor a thumbprint on file
    pub require_authentication: bool,
    /// Header a TLS-terminating proxy forwards the client certificate in
    pub client_cert_header: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_authentication: false,
            client_cert_header: "X-Client-Cert".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub response_timeout_secs: u64,
    pub remote_stop_max_meter_age_secs: i64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 30,
            remote_stop_max_meter_age_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub implicit_grants: bool,
    pub default_expiry_minutes: i64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            implicit_grants: true,
            default_expiry_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9091".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "Loading configuration");
                Self::from_toml(&text)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Checks serde cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.server.path_prefix.trim_matches('/').is_empty() {
            return Err(AppError::Config("server.path_prefix must not be empty".into()));
        }
        if self.server.heartbeat_interval <= 0 {
            return Err(AppError::Config("server.heartbeat_interval must be positive".into()));
        }
        if self.commands.response_timeout_secs == 0 {
            return Err(AppError::Config("commands.response_timeout_secs must be positive".into()));
        }
        if self.logging.message_log_level > 2 {
            return Err(AppError::Config("logging.message_log_level must be 0, 1 or 2".into()));
        }
        Ok(())
    }
}

/// `<config_dir>/ocpp-core/config.toml`, or `./config.toml` when the
/// platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("ocpp-core").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Resolve the config path: explicit flag, then `OCPP_CONFIG`, then the
/// platform default.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.address(), "0.0.0.0:9000");
        assert_eq!(config.database.backend, StorageBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9100
            path_prefix = "steve/websocket/CentralSystemService"

            [database]
            backend = "memory"

            [logging]
            message_log_level = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.heartbeat_interval, 300);
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.logging.message_log_level, 2);
        assert_eq!(config.commands.response_timeout_secs, 30);
        assert!(config.authorization.implicit_grants);
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = AppConfig::from_toml("[server\nport = ").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = AppConfig::from_toml("[database]\nbackend = \"oracle\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("ocpp-core-missing-{}.toml", uuid::Uuid::new_v4()));
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn file_is_loaded_from_disk() {
        let path = std::env::temp_dir().join(format!("ocpp-core-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[security]\nrequire_authentication = true\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(config.security.require_authentication);
        assert_eq!(config.security.client_cert_header, "X-Client-Cert");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.path_prefix = "/".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.message_log_level = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(explicit.clone())), explicit);
        assert!(default_config_path().ends_with("config.toml"));
    }
}
