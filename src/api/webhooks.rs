use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::services::webhook_processor::{WebhookDisposition, WebhookProcessorError};

const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// POST /webhooks/paystack
///
/// Anything past signature verification is acknowledged with 200 so the
/// provider does not keep redelivering; failures are logged.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.webhooks.process_webhook(signature, &body).await {
        Ok(WebhookDisposition::Reconciled { reference, settled }) => {
            info!(reference = %reference, settled, "Webhook processed successfully");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Ok(WebhookDisposition::Capture { order_id }) => {
            info!(order_id = %order_id, "Capture webhook processed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Ok(WebhookDisposition::Ignored { event }) => {
            info!(event = %event, "Webhook acknowledged");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(e) if e.is_authentication_failure() => {
            warn!(error = %e, "Rejected webhook");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"status": "error", "message": e.to_string()})),
            )
                .into_response()
        }
        Err(e @ WebhookProcessorError::MalformedPayload(_)) => {
            warn!(error = %e, "Unusable webhook payload");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Webhook processing failed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
    }
}
