//! MeterValues handler

use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::types::MeterValue;
use serde_json::Value;
use tracing::debug;

use crate::application::connectors::{MeterSnapshot, RawSample};
use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV16};
use crate::domain::ProtocolError;

/// Normalised readings of a 1.6 meter value list.
pub(super) fn snapshot(values: &[MeterValue]) -> MeterSnapshot {
    let mut snapshot = MeterSnapshot::default();
    for value in values {
        let samples: Vec<RawSample> = value
            .sampled_value
            .iter()
            .map(|s| RawSample {
                value: s.value.clone(),
                measurand: s.measurand.as_ref().and_then(enum_label),
                unit: s.unit.as_ref().and_then(enum_label),
                multiplier: 0,
            })
            .collect();
        snapshot.add(value.timestamp, &samples);
    }
    snapshot
}

pub async fn handle_meter_values(handler: &OcppHandlerV16, payload: Value) -> Result<Value, ProtocolError> {
    let req: MeterValuesRequest = parse(payload)?;
    let connector_id = req.connector_id as i32;
    debug!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id,
        transaction_id = ?req.transaction_id,
        values = req.meter_value.len(),
        "MeterValues"
    );

    let snapshot = snapshot(&req.meter_value);
    handler
        .services
        .tracker
        .record_meter(&handler.charge_point_id, connector_id, &handler.live, &snapshot)
        .await?;

    to_payload(&MeterValuesResponse {})
}
