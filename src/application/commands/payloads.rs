//! Default request payloads
//!
//! A command queued with an empty payload gets one built from its connector
//! and tag, in the shape the negotiated version expects.

use serde_json::{json, Map, Value};

use crate::domain::{CommandType, OcppVersion, OutboundCommand};

fn is_blank(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// The payload to transmit for `command`.
pub fn wire_payload(version: OcppVersion, command: &OutboundCommand) -> Value {
    if !is_blank(&command.payload) {
        return command.payload.clone();
    }

    let connector = command.connector_id;
    let tag = command.tag_id.as_deref();
    let mut body = Map::new();
    match (command.command_type, version) {
        (CommandType::RemoteStartTransaction, OcppVersion::V16) => {
            if let Some(c) = connector {
                body.insert("connectorId".into(), json!(c));
            }
            if let Some(t) = tag {
                body.insert("idTag".into(), json!(t));
            }
        }
        (CommandType::RemoteStartTransaction, OcppVersion::V201) => {
            if let Some(c) = connector {
                body.insert("evseId".into(), json!(c));
            }
            if let Some(t) = tag {
                body.insert("idToken".into(), json!({ "idToken": t, "type": "Central" }));
            }
            body.insert("remoteStartId".into(), json!(command.id));
        }
        (CommandType::UnlockConnector, OcppVersion::V16) => {
            if let Some(c) = connector {
                body.insert("connectorId".into(), json!(c));
            }
        }
        (CommandType::UnlockConnector, OcppVersion::V201) => {
            if let Some(c) = connector {
                body.insert("evseId".into(), json!(c));
                body.insert("connectorId".into(), json!(1));
            }
        }
        _ => {}
    }
    Value::Object(body)
}
