use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::error::body_rejection;
use crate::middleware::logging::CurrentRequestId;
use crate::services::checkout::CheckoutRequest;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub authorization_url: String,
    pub reference: String,
}

/// POST /checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    request_id: CurrentRequestId,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let Json(request) = payload.map_err(|e| request_id.tag(body_rejection(e)))?;

    let session = state
        .checkout
        .checkout(request)
        .await
        .map_err(|e| request_id.tag(e))?;

    Ok(Json(CheckoutResponse {
        success: true,
        authorization_url: session.authorization_url,
        reference: session.reference,
    }))
}
