//! Station authentication
//!
//! Runs right after the WebSocket upgrade, before the session is
//! registered. A station with Basic credentials on file must present them;
//! a station with a certificate thumbprint on file must present a matching
//! client certificate through the proxy header.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{RepositoryProvider, Station};
use crate::infrastructure::crypto::{certificate_thumbprint, thumbprints_match, verify_password};

/// Headers captured during the handshake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeCredentials {
    pub authorization: Option<String>,
    pub client_cert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("Unknown station {0}")]
    UnknownStation(String),

    #[error("Basic credentials required")]
    MissingCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Client certificate required")]
    MissingCertificate,

    #[error("Client certificate does not match")]
    CertificateMismatch,

    #[error("Station has no credentials on file")]
    NotProvisioned,

    #[error("Authentication lookup failed: {0}")]
    Storage(String),
}

/// Decode `Basic base64(user:password)`. The split is at the first `:`.
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

pub struct StationAuthenticator {
    repos: Arc<dyn RepositoryProvider>,
    require_authentication: bool,
}

impl StationAuthenticator {
    pub fn new(repos: Arc<dyn RepositoryProvider>, require_authentication: bool) -> Self {
        Self {
            repos,
            require_authentication,
        }
    }

    pub async fn authenticate(
        &self,
        station_id: &str,
        credentials: &HandshakeCredentials,
    ) -> Result<Station, AuthError> {
        let station = self
            .repos
            .stations()
            .find_by_id(station_id)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .ok_or_else(|| AuthError::UnknownStation(station_id.to_string()))?;

        let has_thumbprint = station.client_cert_thumbprint.is_some();
        if !station.has_credentials() && !has_thumbprint {
            if self.require_authentication {
                return Err(AuthError::NotProvisioned);
            }
            debug!(charge_point_id = station_id, "Station accepted without credentials");
            return Ok(station);
        }

        if station.has_credentials() {
            self.check_basic(&station, credentials.authorization.as_deref())?;
        }
        if let Some(expected) = &station.client_cert_thumbprint {
            let forwarded = credentials
                .client_cert
                .as_deref()
                .ok_or(AuthError::MissingCertificate)?;
            let presented = certificate_thumbprint(forwarded).map_err(|e| {
                warn!(charge_point_id = station_id, error = %e, "Unreadable client certificate");
                AuthError::CertificateMismatch
            })?;
            if !thumbprints_match(&presented, expected) {
                return Err(AuthError::CertificateMismatch);
            }
        }
        Ok(station)
    }

    fn check_basic(&self, station: &Station, header: Option<&str>) -> Result<(), AuthError> {
        let header = header.ok_or(AuthError::MissingCredentials)?;
        let (user, password) = decode_basic(header).ok_or(AuthError::InvalidCredentials)?;

        let expected_user = station.username.as_deref().unwrap_or(&station.station_id);
        if user != expected_user {
            return Err(AuthError::InvalidCredentials);
        }
        match station.password.as_deref() {
            Some(stored) => match verify_password(&password, stored) {
                Ok(true) => Ok(()),
                Ok(false) => Err(AuthError::InvalidCredentials),
                Err(e) => {
                    warn!(charge_point_id = station.station_id.as_str(), error = %e, "Stored password hash unreadable");
                    Err(AuthError::InvalidCredentials)
                }
            },
            None => Ok(()),
        }
    }
}
