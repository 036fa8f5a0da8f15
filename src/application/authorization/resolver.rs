//! Tag/access resolver
//!
//! Lookups never fail for a missing record: they yield a `NotFound`
//! resolution with status `Invalid` so callers can branch on the status
//! alone.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::{
    AccessGrant, AuthStatus, ChargeTag, DomainResult, Lookup, RepositoryProvider, Resolution,
};

/// Strip a vendor suffix appended after the first underscore.
pub fn clean_tag_id(raw: &str) -> &str {
    let tag = match raw.split_once('_') {
        Some((tag, _)) => tag,
        None => raw,
    };
    tag.trim()
}

/// Tag and grant resolved together. `status` is the grant's effective status.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub tag: Resolution<ChargeTag>,
    pub grant: Resolution<AccessGrant>,
}

impl AccessDecision {
    pub fn status(&self) -> AuthStatus {
        self.grant.status
    }

    /// `idTagInfo`-style reply with `status` in place of the grant status.
    pub fn reply(&self, status: AuthStatus, now: DateTime<Utc>, default_expiry: Duration) -> AuthorizationReply {
        AuthorizationReply {
            status,
            expiry: self.grant.expiry().unwrap_or(now + default_expiry),
            parent_tag: self.tag.parent_tag(),
        }
    }
}

/// Status plus the data a station caches for offline authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationReply {
    pub status: AuthStatus,
    pub expiry: DateTime<Utc>,
    pub parent_tag: Option<String>,
}

pub struct TagResolver {
    repos: Arc<dyn RepositoryProvider>,
    implicit_grants: bool,
}

impl TagResolver {
    pub fn new(repos: Arc<dyn RepositoryProvider>, implicit_grants: bool) -> Self {
        Self {
            repos,
            implicit_grants,
        }
    }

    pub async fn resolve_tag(&self, identifier: &str) -> DomainResult<Resolution<ChargeTag>> {
        let tag_id = clean_tag_id(identifier);
        let now = Utc::now();
        match self.repos.charge_tags().find_by_tag_id(tag_id).await? {
            Some(tag) => {
                let status = AuthStatus::effective(tag.status, tag.expiry, now);
                Ok(Resolution::found(tag, status))
            }
            None => {
                debug!(tag_id, "Unknown charge tag");
                Ok(Resolution::not_found())
            }
        }
    }

    /// Resolve the grant of an already resolved tag on `station_id`.
    ///
    /// A tag that is itself Blocked, Expired or Invalid passes its status on.
    /// A usable tag without a grant gets one created when implicit grants are
    /// enabled.
    pub async fn resolve_access(
        &self,
        tag: &Resolution<ChargeTag>,
        station_id: &str,
    ) -> DomainResult<Resolution<AccessGrant>> {
        let Lookup::Found(record) = &tag.lookup else {
            return Ok(Resolution::not_found());
        };

        let now = Utc::now();
        let existing = self.repos.access_grants().find(record.id, station_id).await?;

        if !tag.status.is_usable() {
            return Ok(Resolution {
                lookup: existing.into(),
                status: tag.status,
            });
        }

        match existing {
            Some(grant) => {
                let status = AuthStatus::effective(grant.status, grant.expiry, now);
                Ok(Resolution::found(grant, status))
            }
            None if self.implicit_grants => {
                info!(
                    charge_point_id = station_id,
                    tag_id = record.tag_id.as_str(),
                    "Creating implicit access grant"
                );
                let grant = self
                    .repos
                    .access_grants()
                    .create(AccessGrant::new(record.id, station_id))
                    .await?;
                Ok(Resolution::found(grant, AuthStatus::Accepted))
            }
            None => Ok(Resolution::not_found()),
        }
    }

    /// Tag then grant, the pipeline every authorization-bearing message runs.
    pub async fn authorize(&self, identifier: &str, station_id: &str) -> DomainResult<AccessDecision> {
        let tag = self.resolve_tag(identifier).await?;
        let grant = self.resolve_access(&tag, station_id).await?;
        Ok(AccessDecision { tag, grant })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryRepositoryProvider;

    async fn setup(implicit: bool) -> (Arc<InMemoryRepositoryProvider>, TagResolver) {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let resolver = TagResolver::new(repos.clone(), implicit);
        (repos, resolver)
    }

    #[test]
    fn vendor_suffix_is_stripped() {
        assert_eq!(clean_tag_id("ABC123_99"), "ABC123");
        assert_eq!(clean_tag_id("ABC123"), "ABC123");
        assert_eq!(clean_tag_id("A_B_C"), "A");
    }

    #[tokio::test]
    async fn missing_tag_resolves_invalid_with_sentinel() {
        let (_repos, resolver) = setup(true).await;
        let decision = resolver.authorize("NOPE", "CP1").await.unwrap();
        assert_eq!(decision.status(), AuthStatus::Invalid);
        assert_eq!(decision.tag.id(), crate::domain::INVALID_ID);
        assert_eq!(decision.grant.id(), crate::domain::INVALID_ID);
    }

    #[tokio::test]
    async fn expired_tag_resolves_expired_on_every_read() {
        let (repos, resolver) = setup(true).await;
        let mut tag = ChargeTag::new("OLD");
        tag.expiry = Some(Utc::now() - Duration::hours(1));
        repos.charge_tags().create(tag).await.unwrap();

        for _ in 0..3 {
            let decision = resolver.authorize("OLD", "CP1").await.unwrap();
            assert_eq!(decision.tag.status, AuthStatus::Expired);
            assert_eq!(decision.status(), AuthStatus::Expired);
        }
        // No grant is created for an unusable tag
        let stored = repos.charge_tags().find_by_tag_id("OLD").await.unwrap().unwrap();
        assert!(repos.access_grants().find(stored.id, "CP1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn implicit_grant_is_created_once() {
        let (repos, resolver) = setup(true).await;
        let tag = repos.charge_tags().create(ChargeTag::new("ABC123")).await.unwrap();

        let first = resolver.authorize("ABC123_7", "CP1").await.unwrap();
        let second = resolver.authorize("ABC123", "CP1").await.unwrap();
        assert_eq!(first.status(), AuthStatus::Accepted);
        assert_eq!(first.grant.id(), second.grant.id());
        assert!(repos.access_grants().find(tag.id, "CP1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn without_implicit_grants_unknown_grant_is_invalid() {
        let (repos, resolver) = setup(false).await;
        repos.charge_tags().create(ChargeTag::new("ABC123")).await.unwrap();
        let decision = resolver.authorize("ABC123", "CP1").await.unwrap();
        assert_eq!(decision.tag.status, AuthStatus::Accepted);
        assert_eq!(decision.status(), AuthStatus::Invalid);
    }

    #[tokio::test]
    async fn blocked_grant_wins_over_accepted_tag() {
        let (repos, resolver) = setup(true).await;
        let tag = repos.charge_tags().create(ChargeTag::new("ABC123")).await.unwrap();
        let mut grant = AccessGrant::new(tag.id, "CP1");
        grant.status = AuthStatus::Blocked;
        repos.access_grants().create(grant).await.unwrap();

        let decision = resolver.authorize("ABC123", "CP1").await.unwrap();
        assert_eq!(decision.status(), AuthStatus::Blocked);
    }
}
