//! MeterValues handler

use rust_ocpp::v2_0_1::datatypes::meter_value_type::MeterValueType;
use rust_ocpp::v2_0_1::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use serde_json::Value;
use tracing::debug;

use crate::application::connectors::{MeterSnapshot, RawSample};
use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV201};
use crate::domain::ProtocolError;

/// Normalised readings of a 2.0.1 meter value list.
///
/// The value is a decimal and `unitOfMeasure` may carry a power-of-ten
/// multiplier.
pub(super) fn snapshot(values: &[MeterValueType]) -> MeterSnapshot {
    let mut snapshot = MeterSnapshot::default();
    for value in values {
        let samples: Vec<RawSample> = value
            .sampled_value
            .iter()
            .map(|s| {
                let unit = serde_json::to_value(&s.unit_of_measure).unwrap_or_default();
                RawSample {
                    value: s.value.to_string(),
                    measurand: s.measurand.as_ref().and_then(enum_label),
                    unit: unit.get("unit").and_then(Value::as_str).map(str::to_string),
                    multiplier: unit.get("multiplier").and_then(Value::as_i64).unwrap_or(0) as i32,
                }
            })
            .collect();
        snapshot.add(value.timestamp, &samples);
    }
    snapshot
}

pub async fn handle_meter_values(handler: &OcppHandlerV201, payload: Value) -> Result<Value, ProtocolError> {
    let req: MeterValuesRequest = parse(payload)?;
    let evse_id = req.evse_id as i32;
    debug!(
        charge_point_id = handler.charge_point_id.as_str(),
        evse_id,
        values = req.meter_value.len(),
        "MeterValues"
    );

    let snapshot = snapshot(&req.meter_value);
    handler
        .services
        .tracker
        .record_meter(&handler.charge_point_id, evse_id, &handler.live, &snapshot)
        .await?;

    to_payload(&MeterValuesResponse {})
}
