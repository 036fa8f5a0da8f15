//! DataTransfer handler

use rust_ocpp::v1_6::messages::data_transfer::{DataTransferRequest, DataTransferResponse};
use rust_ocpp::v1_6::types::DataTransferStatus;
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, to_payload, OcppHandlerV16};
use crate::domain::ProtocolError;

pub async fn handle_data_transfer(handler: &OcppHandlerV16, payload: Value) -> Result<Value, ProtocolError> {
    let req: DataTransferRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        vendor_id = req.vendor_string.as_str(),
        message_id = ?req.message_id,
        data = ?req.data,
        "DataTransfer"
    );

    to_payload(&DataTransferResponse {
        status: DataTransferStatus::Accepted,
        data: None,
    })
}
