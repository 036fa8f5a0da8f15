//! StopTransaction handler

use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use serde_json::Value;
use tracing::{info, warn};

use super::handle_meter_values::snapshot;
use super::id_tag_info;
use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV16};
use crate::application::transactions::StopRequest;
use crate::domain::ProtocolError;

pub async fn handle_stop_transaction(
    handler: &OcppHandlerV16,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: StopTransactionRequest = parse(payload)?;
    let transaction_id = req.transaction_id as i32;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        transaction_id,
        id_tag = ?req.id_tag,
        meter_stop = req.meter_stop as i64,
        "StopTransaction"
    );

    let transaction_data = match &req.transaction_data {
        Some(values) => match serde_json::to_string(values) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "Transaction data could not be serialized");
                None
            }
        },
        None => None,
    };

    let outcome = handler
        .services
        .transactions
        .stop(
            &handler.charge_point_id,
            StopRequest {
                transaction_id,
                tag_identifier: req.id_tag.clone(),
                meter_stop: req.meter_stop as i64,
                timestamp: req.timestamp,
                reason: req.reason.as_ref().and_then(enum_label),
                transaction_data,
            },
        )
        .await?;

    // Samples sent with the stop refresh the live view of the connector.
    if let (Some(values), Some(tx)) = (&req.transaction_data, &outcome.transaction) {
        let snapshot = snapshot(values);
        handler
            .services
            .tracker
            .update_live_metrics(&handler.live, tx.connector_id, snapshot.live());
    }

    to_payload(&StopTransactionResponse {
        id_tag_info: Some(id_tag_info(&outcome.reply)),
    })
}
