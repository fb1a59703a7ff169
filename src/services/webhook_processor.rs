use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::payments::provider::PaymentGateway;
use crate::services::delivery::captured_order_id;
use crate::services::reconciliation::PaymentReconciler;

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Missing signature")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl WebhookProcessorError {
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            WebhookProcessorError::MissingSignature | WebhookProcessorError::InvalidSignature
        )
    }
}

/// What happened to an accepted webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Reference re-verified through the gateway
    Reconciled { reference: String, settled: bool },
    /// Success of a delivery capture; delivery confirmation already settled it
    Capture { order_id: String },
    /// Event type this service does not act on
    Ignored { event: String },
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    data: JsonValue,
}

/// Handles signed gateway webhooks.
///
/// Payload contents are never trusted: a `charge.success` only names the
/// reference to verify.
pub struct WebhookProcessor {
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Arc<PaymentReconciler>,
}

impl WebhookProcessor {
    pub fn new(gateway: Arc<dyn PaymentGateway>, reconciler: Arc<PaymentReconciler>) -> Self {
        Self {
            gateway,
            reconciler,
        }
    }

    pub async fn process_webhook(
        &self,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookDisposition, WebhookProcessorError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(WebhookProcessorError::MissingSignature)?;

        if !self.gateway.verify_webhook_signature(payload, signature) {
            error!(provider = %self.gateway.name(), "Invalid webhook signature");
            return Err(WebhookProcessorError::InvalidSignature);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|e| WebhookProcessorError::MalformedPayload(e.to_string()))?;

        match envelope.event.as_str() {
            "charge.success" => {
                let reference = envelope
                    .data
                    .get("reference")
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        WebhookProcessorError::MalformedPayload(
                            "Missing transaction reference".to_string(),
                        )
                    })?
                    .to_string();

                if let Some(order_id) = captured_order_id(&reference) {
                    info!(
                        reference = %reference,
                        order_id = %order_id,
                        "Capture webhook acknowledged"
                    );
                    return Ok(WebhookDisposition::Capture {
                        order_id: order_id.to_string(),
                    });
                }

                info!(reference = %reference, "Processing payment success webhook");
                let outcome = self
                    .reconciler
                    .verify_payment(&reference)
                    .await
                    .map_err(|e| {
                        warn!(reference = %reference, error = %e, "Webhook processing failed");
                        WebhookProcessorError::ProcessingError(e.to_string())
                    })?;

                Ok(WebhookDisposition::Reconciled {
                    reference,
                    settled: outcome.success,
                })
            }
            other => {
                info!(event = %other, "Ignoring webhook event");
                Ok(WebhookDisposition::Ignored {
                    event: other.to_string(),
                })
            }
        }
    }
}
