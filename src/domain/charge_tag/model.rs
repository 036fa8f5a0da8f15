//! Charge tag and access grant entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id reported for a record that does not exist.
pub const INVALID_ID: i32 = -1;

/// Authorization status shared by tags and grants (OCPP 1.6 `AuthorizationStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthStatus {
    #[default]
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Blocked => "Blocked",
            Self::Expired => "Expired",
            Self::Invalid => "Invalid",
            Self::ConcurrentTx => "ConcurrentTx",
        }
    }

    /// Classify a stored status against an optional expiry.
    ///
    /// `Blocked` wins over expiry; a past expiry wins over every other
    /// stored value, including `ConcurrentTx`.
    pub fn effective(stored: AuthStatus, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        if stored == Self::Blocked {
            return Self::Blocked;
        }
        match expiry {
            Some(expiry) if expiry < now => Self::Expired,
            _ => stored,
        }
    }

    /// Accepted or ConcurrentTx: the credential may be used.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Accepted | Self::ConcurrentTx)
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AuthStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "blocked" => Self::Blocked,
            "expired" => Self::Expired,
            "concurrenttx" => Self::ConcurrentTx,
            _ => Self::Invalid,
        }
    }
}

/// RFID card / authorization token
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeTag {
    /// Internal key
    pub id: i32,
    /// The identifier presented by the station
    pub tag_id: String,
    pub name: Option<String>,
    /// Group tag this credential belongs to
    pub parent_tag_id: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub status: AuthStatus,
}

impl ChargeTag {
    pub fn new(tag_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            tag_id: tag_id.into(),
            name: None,
            parent_tag_id: None,
            expiry: None,
            status: AuthStatus::Accepted,
        }
    }
}

/// Authorization of one tag on one station.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessGrant {
    pub id: i32,
    pub tag_pk: i32,
    pub station_id: String,
    pub status: AuthStatus,
    pub expiry: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn new(tag_pk: i32, station_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            tag_pk,
            station_id: station_id.into(),
            status: AuthStatus::Accepted,
            expiry: None,
            updated_at: Utc::now(),
        }
    }
}

/// Outcome of a lookup that must not fail for a missing record.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn as_found(&self) -> Option<&T> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

/// A looked-up record together with its effective status.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub lookup: Lookup<T>,
    pub status: AuthStatus,
}

impl<T> Resolution<T> {
    pub fn found(record: T, status: AuthStatus) -> Self {
        Self {
            lookup: Lookup::Found(record),
            status,
        }
    }

    pub fn not_found() -> Self {
        Self {
            lookup: Lookup::NotFound,
            status: AuthStatus::Invalid,
        }
    }

    pub fn record(&self) -> Option<&T> {
        self.lookup.as_found()
    }
}

impl Resolution<ChargeTag> {
    /// Internal id, or [`INVALID_ID`] when no tag matched.
    pub fn id(&self) -> i32 {
        self.record().map_or(INVALID_ID, |t| t.id)
    }

    pub fn parent_tag(&self) -> Option<String> {
        self.record().and_then(|t| t.parent_tag_id.clone())
    }
}

impl Resolution<AccessGrant> {
    pub fn id(&self) -> i32 {
        self.record().map_or(INVALID_ID, |g| g.id)
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.record().and_then(|g| g.expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_overrides_stored_status() {
        let now = Utc::now();
        let past = Some(now - Duration::minutes(1));
        assert_eq!(AuthStatus::effective(AuthStatus::Accepted, past, now), AuthStatus::Expired);
        assert_eq!(
            AuthStatus::effective(AuthStatus::ConcurrentTx, past, now),
            AuthStatus::Expired
        );
        assert_eq!(AuthStatus::effective(AuthStatus::Blocked, past, now), AuthStatus::Blocked);
    }

    #[test]
    fn future_expiry_keeps_stored_status() {
        let now = Utc::now();
        let future = Some(now + Duration::days(1));
        assert_eq!(
            AuthStatus::effective(AuthStatus::ConcurrentTx, future, now),
            AuthStatus::ConcurrentTx
        );
        assert_eq!(AuthStatus::effective(AuthStatus::Accepted, None, now), AuthStatus::Accepted);
    }

    #[test]
    fn not_found_resolution_uses_sentinel() {
        let r: Resolution<ChargeTag> = Resolution::not_found();
        assert_eq!(r.id(), INVALID_ID);
        assert_eq!(r.status, AuthStatus::Invalid);
        assert!(r.parent_tag().is_none());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(AuthStatus::from("concurrenttx"), AuthStatus::ConcurrentTx);
        assert_eq!(AuthStatus::from("whatever"), AuthStatus::Invalid);
    }
}
