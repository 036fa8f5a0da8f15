//! Answer classification per command type

use serde_json::Value;

use crate::domain::{CommandStatus, CommandType, OcppVersion};

/// Statuses that count as success for `command` on `version`.
/// `None` means any answer completes the command.
fn accepted_statuses(version: OcppVersion, command: CommandType) -> Option<&'static [&'static str]> {
    use CommandType::*;
    let statuses: &'static [&'static str] = match (command, version) {
        (UnlockConnector, _) => &["Unlocked"],
        (ReserveNow, _) => &["Accepted", "Occupied", "Unavailable"],
        (ChangeConfiguration, _) => &["Accepted", "RebootRequired"],
        (Reset, OcppVersion::V201) => &["Accepted", "Scheduled"],
        (ChangeAvailability, _) => &["Accepted", "Scheduled"],
        (UpdateFirmware, OcppVersion::V16) => return None,
        _ => &["Accepted"],
    };
    Some(statuses)
}

/// The status an answer reports. SetVariables nests one per variable, and
/// all of them have to agree.
fn reported_status(command: CommandType, payload: &Value) -> Option<String> {
    if let Some(status) = payload.get("status").and_then(Value::as_str) {
        return Some(status.to_string());
    }
    if command == CommandType::ChangeConfiguration {
        let results = payload.get("setVariableResult")?.as_array()?;
        let mut statuses = results
            .iter()
            .map(|r| r.get("attributeStatus").and_then(Value::as_str));
        let first = statuses.next()??;
        if statuses.all(|s| s == Some(first)) {
            return Some(first.to_string());
        }
        return Some("Rejected".to_string());
    }
    None
}

/// Map a CallResult payload to `Completed` or `Failed`.
pub fn answer_status(version: OcppVersion, command: CommandType, payload: &Value) -> CommandStatus {
    let Some(accepted) = accepted_statuses(version, command) else {
        return CommandStatus::Completed;
    };
    match reported_status(command, payload) {
        Some(status) if accepted.contains(&status.as_str()) => CommandStatus::Completed,
        _ => CommandStatus::Failed,
    }
}
