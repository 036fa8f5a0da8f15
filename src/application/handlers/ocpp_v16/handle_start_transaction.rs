//! StartTransaction handler

use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use serde_json::Value;
use tracing::info;

use super::id_tag_info;
use crate::application::handlers::{parse, to_payload, OcppHandlerV16};
use crate::application::transactions::StartRequest;
use crate::domain::ProtocolError;

pub async fn handle_start_transaction(
    handler: &OcppHandlerV16,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: StartTransactionRequest = parse(payload)?;
    let connector_id = req.connector_id as i32;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id,
        id_tag = req.id_tag.as_str(),
        meter_start = req.meter_start as i64,
        "StartTransaction"
    );

    let outcome = handler
        .services
        .transactions
        .start(
            &handler.charge_point_id,
            StartRequest {
                connector_id,
                tag_identifier: req.id_tag,
                meter_start: req.meter_start as i64,
                timestamp: req.timestamp,
                device_uid: None,
            },
        )
        .await?;

    to_payload(&StartTransactionResponse {
        transaction_id: outcome.transaction_id as _,
        id_tag_info: id_tag_info(&outcome.reply),
    })
}
