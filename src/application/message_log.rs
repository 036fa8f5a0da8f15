//! Fire-and-forget message log writer

use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use crate::domain::{Direction, MessageLogEntry, RepositoryProvider};

/// Chatty actions left out at level 1.
const QUIET_ACTIONS: [&str; 4] = ["BootNotification", "Heartbeat", "DataTransfer", "StatusNotification"];

#[derive(Clone)]
pub struct MessageLogger {
    repos: Arc<dyn RepositoryProvider>,
    level: u8,
}

impl MessageLogger {
    /// `level` 0 disables logging, 1 skips the chatty actions, 2 keeps all.
    pub fn new(repos: Arc<dyn RepositoryProvider>, level: u8) -> Self {
        Self { repos, level }
    }

    pub fn should_log(&self, action: &str) -> bool {
        match self.level {
            0 => false,
            1 => !QUIET_ACTIONS.contains(&action),
            _ => true,
        }
    }

    /// Append an entry in the background. Failures are logged, never returned.
    pub fn record(
        &self,
        station_id: &str,
        connector_id: Option<i32>,
        action: &str,
        result: Option<String>,
        error_code: Option<String>,
        direction: Direction,
    ) {
        if !self.should_log(action) {
            return;
        }
        let entry = MessageLogEntry {
            log_time: Utc::now(),
            station_id: station_id.to_string(),
            connector_id,
            message: action.to_string(),
            result,
            error_code,
            direction,
        };
        let repos = self.repos.clone();
        tokio::spawn(async move {
            let station_id = entry.station_id.clone();
            if let Err(e) = repos.message_log().append(entry).await {
                error!(charge_point_id = station_id.as_str(), error = %e, "Failed to write message log");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryRepositoryProvider;

    #[test]
    fn level_one_skips_chatty_actions() {
        let logger = MessageLogger::new(Arc::new(InMemoryRepositoryProvider::new()), 1);
        assert!(!logger.should_log("Heartbeat"));
        assert!(!logger.should_log("StatusNotification"));
        assert!(logger.should_log("StartTransaction"));

        let off = MessageLogger::new(Arc::new(InMemoryRepositoryProvider::new()), 0);
        assert!(!off.should_log("StartTransaction"));
    }

    #[tokio::test]
    async fn record_appends_in_background() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let logger = MessageLogger::new(repos.clone(), 2);
        logger.record("CP1", Some(1), "Authorize", Some("{}".into()), None, Direction::Inbound);

        for _ in 0..50 {
            if !repos.message_log().list_for_station("CP1", 10).await.unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let entries = repos.message_log().list_for_station("CP1", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Authorize");
    }
}
