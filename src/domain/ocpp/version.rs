//! OCPP protocol version
//!
//! Defines the supported OCPP versions and their WebSocket subprotocol tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported OCPP protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OcppVersion {
    /// OCPP 1.6 (JSON / OCPP-J)
    V16,
    /// OCPP 2.0.1, also served to stations that offer plain `ocpp2.0`
    V201,
}

impl OcppVersion {
    /// Canonical `Sec-WebSocket-Protocol` token.
    pub fn subprotocol(&self) -> &'static str {
        match self {
            Self::V16 => "ocpp1.6",
            Self::V201 => "ocpp2.0.1",
        }
    }

    /// Every token accepted for this version, most specific first.
    pub fn subprotocols(&self) -> &'static [&'static str] {
        match self {
            Self::V16 => &["ocpp1.6"],
            Self::V201 => &["ocpp2.0.1", "ocpp2.0"],
        }
    }

    /// Parse an OCPP version from a WebSocket subprotocol string.
    pub fn from_subprotocol(s: &str) -> Option<Self> {
        let token = s.trim();
        [Self::V201, Self::V16]
            .into_iter()
            .find(|v| v.subprotocols().iter().any(|p| p.eq_ignore_ascii_case(token)))
    }

    /// Server preference order, newest first.
    pub const ALL: &'static [OcppVersion] = &[Self::V201, Self::V16];

    pub fn version_string(&self) -> &'static str {
        match self {
            Self::V16 => "1.6",
            Self::V201 => "2.0.1",
        }
    }
}

impl fmt::Display for OcppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OCPP {}", self.version_string())
    }
}
