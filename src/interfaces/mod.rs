//! Outer interfaces: the station-facing WebSocket server

pub mod ws;
