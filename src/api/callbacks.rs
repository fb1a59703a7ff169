use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database::order_repository::Order;
use crate::error::AppError;
use crate::middleware::logging::CurrentRequestId;
use crate::services::order_state::OrderStatus;
use crate::services::reconciliation::VerificationOutcome;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
    /// Paystack also appends `trxref`; same value as `reference`
    pub trxref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PodCallbackQuery {
    pub auth_code: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationResponse {
    pub success: bool,
    pub status: OrderStatus,
    pub reference: String,
    pub order: Order,
}

/// GET /callback?reference=
pub async fn payment_callback(
    State(state): State<AppState>,
    request_id: CurrentRequestId,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<VerificationOutcome>, AppError> {
    let reference = query.reference.or(query.trxref).unwrap_or_default();

    let outcome = state
        .reconciler
        .verify_payment(&reference)
        .await
        .map_err(|e| request_id.tag(e))?;

    Ok(Json(outcome))
}

/// GET /pod-callback?auth_code=&reference=
pub async fn pod_callback(
    State(state): State<AppState>,
    request_id: CurrentRequestId,
    Query(query): Query<PodCallbackQuery>,
) -> Result<Json<AuthorizationResponse>, AppError> {
    let reference = query.reference.unwrap_or_default();
    let auth_code = query.auth_code.unwrap_or_default();

    let order = state
        .reconciler
        .authorize_pay_on_delivery(&reference, &auth_code)
        .await
        .map_err(|e| request_id.tag(e))?;

    Ok(Json(AuthorizationResponse {
        success: true,
        status: order.status,
        reference: order.id.clone(),
        order,
    }))
}
