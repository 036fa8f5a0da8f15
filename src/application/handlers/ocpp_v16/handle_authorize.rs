//! Authorize handler

use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use serde_json::Value;
use tracing::info;

use super::id_tag_info;
use crate::application::handlers::{parse, to_payload, OcppHandlerV16};
use crate::domain::ProtocolError;

pub async fn handle_authorize(handler: &OcppHandlerV16, payload: Value) -> Result<Value, ProtocolError> {
    let req: AuthorizeRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        id_tag = req.id_tag.as_str(),
        "Authorize"
    );

    let reply = handler
        .services
        .transactions
        .authorize(&handler.charge_point_id, &req.id_tag)
        .await?;

    to_payload(&AuthorizeResponse {
        id_tag_info: id_tag_info(&reply),
    })
}
