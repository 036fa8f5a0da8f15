//! Message correlator
//!
//! Pending server-initiated calls indexed by (station, uniqueId). An answer
//! resolves and removes its entry; an answer without an entry is dropped.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::CommandError;
use crate::domain::CommandType;

/// The station's reply to one of our calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// CallResult payload
    Result(Value),
    /// CallError
    Error {
        code: String,
        description: String,
        details: Value,
    },
}

impl Answer {
    /// Text kept as the command result.
    pub fn summary(&self) -> String {
        match self {
            Self::Result(payload) => payload.to_string(),
            Self::Error {
                code, description, ..
            } => format!("{}: {}", code, description),
        }
    }
}

#[derive(Debug)]
pub struct PendingCorrelation {
    pub action: String,
    pub command_type: Option<CommandType>,
    /// Request envelope as transmitted, `Null` until sent
    pub request: Value,
    pub created_at: Instant,
    waiter: Option<oneshot::Sender<Answer>>,
}

impl PendingCorrelation {
    /// Hand the answer to a blocked caller, if any.
    pub fn resolve(self, answer: Answer) {
        if let Some(waiter) = self.waiter {
            let _ = waiter.send(answer);
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Correlation id {0} is already pending")]
pub struct DuplicateCorrelation(pub String);

type Key = (String, String);

#[derive(Default)]
pub struct Correlator {
    pending: DashMap<Key, PendingCorrelation>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(station_id: &str, unique_id: &str) -> Key {
        (station_id.to_string(), unique_id.to_string())
    }

    /// Reserve `unique_id` for a caller that blocks on the answer.
    pub fn register(
        &self,
        station_id: &str,
        unique_id: &str,
        command_type: CommandType,
    ) -> Result<oneshot::Receiver<Answer>, DuplicateCorrelation> {
        match self.pending.entry(Self::key(station_id, unique_id)) {
            Entry::Occupied(_) => Err(DuplicateCorrelation(unique_id.to_string())),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingCorrelation {
                    action: command_type.as_str().to_string(),
                    command_type: Some(command_type),
                    request: Value::Null,
                    created_at: Instant::now(),
                    waiter: Some(tx),
                });
                Ok(rx)
            }
        }
    }

    /// Record a transmitted call. Fills in an existing reservation, or tracks
    /// a fire-and-forget call nobody waits for.
    pub fn track(
        &self,
        station_id: &str,
        unique_id: &str,
        action: &str,
        command_type: Option<CommandType>,
        request: Value,
    ) {
        let mut entry = self
            .pending
            .entry(Self::key(station_id, unique_id))
            .or_insert_with(|| PendingCorrelation {
                action: action.to_string(),
                command_type,
                request: Value::Null,
                created_at: Instant::now(),
                waiter: None,
            });
        entry.action = action.to_string();
        entry.request = request;
    }

    /// Remove and return the entry an answer belongs to.
    pub fn take(&self, station_id: &str, unique_id: &str) -> Option<PendingCorrelation> {
        self.pending
            .remove(&Self::key(station_id, unique_id))
            .map(|(_, pending)| pending)
    }

    pub fn is_pending(&self, station_id: &str, unique_id: &str) -> bool {
        self.pending.contains_key(&Self::key(station_id, unique_id))
    }

    /// Wire action of a pending call.
    pub fn action_of(&self, station_id: &str, unique_id: &str) -> Option<String> {
        self.pending
            .get(&Self::key(station_id, unique_id))
            .map(|p| p.action.clone())
    }

    /// Await the answer for a reservation. On timeout the entry is removed,
    /// so a late answer finds nothing and is dropped.
    pub async fn wait(
        &self,
        station_id: &str,
        unique_id: &str,
        rx: oneshot::Receiver<Answer>,
        limit: Duration,
    ) -> Result<Answer, CommandError> {
        match timeout(limit, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => {
                self.take(station_id, unique_id);
                Err(CommandError::ChannelClosed)
            }
            Err(_) => {
                self.take(station_id, unique_id);
                warn!(
                    charge_point_id = station_id,
                    message_id = unique_id,
                    "Command timed out"
                );
                Err(CommandError::Timeout)
            }
        }
    }

    /// Drop entries older than `max_age`. Returns how many were removed.
    pub fn purge_expired(&self, max_age: Duration) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.created_at.elapsed() < max_age);
        before - self.pending.len()
    }

    /// Forget every pending call of a disconnected station. Blocked callers
    /// see their channel close.
    pub fn cleanup_station(&self, station_id: &str) {
        self.pending.retain(|key, _| key.0 != station_id);
        debug!(charge_point_id = station_id, "Pending correlations cleared");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn answer_resolves_waiting_caller() {
        let correlator = Correlator::new();
        let rx = correlator.register("CP1", "abc", CommandType::Reset).unwrap();
        correlator.track("CP1", "abc", "Reset", Some(CommandType::Reset), json!([2, "abc", "Reset", {}]));

        let pending = correlator.take("CP1", "abc").unwrap();
        assert_eq!(pending.action, "Reset");
        pending.resolve(Answer::Result(json!({"status": "Accepted"})));

        let answer = correlator
            .wait("CP1", "abc", rx, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(answer, Answer::Result(json!({"status": "Accepted"})));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn timeout_removes_entry_and_late_answer_finds_nothing() {
        let correlator = Correlator::new();
        let rx = correlator.register("CP1", "late", CommandType::Reset).unwrap();

        let err = correlator
            .wait("CP1", "late", rx, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Timeout);
        assert!(correlator.take("CP1", "late").is_none());
    }

    #[test]
    fn ids_are_not_reused_while_pending() {
        let correlator = Correlator::new();
        let _rx = correlator.register("CP1", "dup", CommandType::Reset).unwrap();
        assert!(correlator.register("CP1", "dup", CommandType::ClearCache).is_err());
        // Same id on another station is a different key
        assert!(correlator.register("CP2", "dup", CommandType::Reset).is_ok());
    }

    #[test]
    fn cleanup_only_touches_one_station() {
        let correlator = Correlator::new();
        correlator.track("CP1", "a", "Reset", None, Value::Null);
        correlator.track("CP2", "b", "Reset", None, Value::Null);
        correlator.cleanup_station("CP1");
        assert!(!correlator.is_pending("CP1", "a"));
        assert!(correlator.is_pending("CP2", "b"));
    }

    #[test]
    fn purge_drops_old_entries() {
        let correlator = Correlator::new();
        correlator.track("CP1", "a", "Reset", None, Value::Null);
        assert_eq!(correlator.purge_expired(Duration::from_secs(60)), 0);
        assert_eq!(correlator.purge_expired(Duration::ZERO), 1);
    }
}
