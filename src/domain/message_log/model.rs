use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Station-initiated call and our response
    Inbound,
    /// Answer to a server-initiated command
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "out" {
            Self::Outbound
        } else {
            Self::Inbound
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageLogEntry {
    pub log_time: DateTime<Utc>,
    pub station_id: String,
    pub connector_id: Option<i32>,
    /// Action name
    pub message: String,
    /// Response payload or error text
    pub result: Option<String>,
    pub error_code: Option<String>,
    pub direction: Direction,
}
