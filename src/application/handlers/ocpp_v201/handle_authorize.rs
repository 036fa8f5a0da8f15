//! Authorize handler

use rust_ocpp::v2_0_1::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use serde_json::Value;
use tracing::info;

use super::id_token_info;
use crate::application::handlers::{parse, to_payload, OcppHandlerV201};
use crate::domain::ProtocolError;

pub async fn handle_authorize(handler: &OcppHandlerV201, payload: Value) -> Result<Value, ProtocolError> {
    let req: AuthorizeRequest = parse(payload)?;
    let id_token = &req.id_token.id_token;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        id_token = id_token.as_str(),
        token_type = ?req.id_token.kind,
        "Authorize"
    );

    let reply = handler
        .services
        .transactions
        .authorize(&handler.charge_point_id, id_token)
        .await?;

    to_payload(&AuthorizeResponse {
        certificate_status: None,
        id_token_info: id_token_info(&reply),
    })
}
