//! Connection registry
//!
//! One entry per station id. A new connection replaces a closed one and is
//! refused while the old socket is still open.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Connection, SessionError};

pub struct SessionRegistry {
    connections: DashMap<String, Connection>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    fn record_gauge(&self) {
        metrics::gauge!("ocpp_connected_stations").set(self.connections.len() as f64);
    }

    pub fn register(&self, connection: Connection) -> Result<(), SessionError> {
        let station_id = connection.station_id.clone();
        match self.connections.entry(station_id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_open() {
                    return Err(SessionError::AlreadyConnected(station_id));
                }
                warn!(
                    charge_point_id = station_id.as_str(),
                    stale_connection = %existing.get().connection_id,
                    "Evicting stale session"
                );
                existing.insert(connection);
            }
            Entry::Vacant(slot) => {
                slot.insert(connection);
            }
        }
        info!(charge_point_id = station_id.as_str(), "Session registered");
        self.record_gauge();
        Ok(())
    }

    /// Remove the entry if it still belongs to `connection_id`. A session
    /// that was already replaced leaves the newer entry alone.
    pub fn unregister(&self, station_id: &str, connection_id: Uuid) -> bool {
        let removed = self
            .connections
            .remove_if(station_id, |_, c| c.connection_id == connection_id)
            .is_some();
        if removed {
            info!(charge_point_id = station_id, "Session unregistered");
            self.record_gauge();
        }
        removed
    }

    pub fn get(&self, station_id: &str) -> Option<Connection> {
        self.connections.get(station_id).map(|c| c.clone())
    }

    pub fn send_to(&self, station_id: &str, message: String) -> Result<(), SessionError> {
        match self.connections.get(station_id) {
            Some(conn) => conn.send(message),
            None => Err(SessionError::NotConnected(station_id.to_string())),
        }
    }

    /// Wake the session loop so it drains queued commands. Returns `false`
    /// when the station is offline.
    pub fn wake(&self, station_id: &str) -> bool {
        match self.connections.get(station_id) {
            Some(conn) => {
                conn.wake.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn touch(&self, station_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(station_id) {
            conn.touch();
        }
    }

    pub fn is_connected(&self, station_id: &str) -> bool {
        self.connections
            .get(station_id)
            .is_some_and(|c| c.is_open())
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Empty the registry, returning what was registered.
    pub fn drain(&self) -> Vec<Connection> {
        let ids = self.connected_ids();
        let drained: Vec<Connection> = ids
            .iter()
            .filter_map(|id| self.connections.remove(id).map(|(_, c)| c))
            .collect();
        self.record_gauge();
        drained
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;
