//! DataTransfer handler

use rust_ocpp::v2_0_1::enumerations::data_transfer_status_enum_type::DataTransferStatusEnumType;
use rust_ocpp::v2_0_1::messages::datatransfer::{DataTransferRequest, DataTransferResponse};
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, to_payload, OcppHandlerV201};
use crate::domain::ProtocolError;

pub async fn handle_data_transfer(handler: &OcppHandlerV201, payload: Value) -> Result<Value, ProtocolError> {
    let req: DataTransferRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        vendor_id = req.vendor_id.as_str(),
        message_id = ?req.message_id,
        "DataTransfer"
    );

    to_payload(&DataTransferResponse {
        status: DataTransferStatusEnumType::Accepted,
        data: None,
        status_info: None,
    })
}
