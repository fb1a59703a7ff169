use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    CardAuthorization, ChargeAuthorizationRequest, ChargeResult, GatewayCustomer,
    GatewayTransactionStatus, InitializeTransactionRequest, InitializedTransaction, ProviderName,
    VerifiedTransaction,
};
use crate::payments::utils::{verify_hmac_sha512_hex, PaymentHttpClient, RetryPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.paystack.co".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

pub struct PaystackProvider {
    config: PaystackConfig,
    http: PaymentHttpClient,
}

impl PaystackProvider {
    pub fn new(config: PaystackConfig) -> PaymentResult<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "PAYSTACK_SECRET_KEY is required".to_string(),
                field: Some("PAYSTACK_SECRET_KEY".to_string()),
            });
        }
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn rejected(message: String) -> PaymentError {
        PaymentError::ProviderError {
            provider: "paystack".to_string(),
            message,
            provider_code: None,
            retryable: false,
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackProvider {
    async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> PaymentResult<InitializedTransaction> {
        if request.amount_minor <= 0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if request.email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "customer email is required for paystack initialization".to_string(),
                field: Some("email".to_string()),
            });
        }

        let payload = initialize_payload(&request);

        let raw: PaystackEnvelope<PaystackInitializeData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/transaction/initialize"),
                Some(&self.config.secret_key),
                Some(&payload),
                RetryPolicy::Never,
            )
            .await?;

        let data = raw.into_data()?;
        info!(reference = %data.reference, "paystack transaction initialized");

        Ok(InitializedTransaction {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify_transaction(&self, reference: &str) -> PaymentResult<VerifiedTransaction> {
        if reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "reference is required".to_string(),
                field: Some("reference".to_string()),
            });
        }

        let raw: PaystackEnvelope<PaystackVerifyData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transaction/verify/{}", reference.trim())),
                Some(&self.config.secret_key),
                None,
                RetryPolicy::Idempotent,
            )
            .await?;

        let data = raw.into_data()?;
        Ok(data.into_verified(reference))
    }

    async fn charge_authorization(
        &self,
        request: ChargeAuthorizationRequest,
    ) -> PaymentResult<ChargeResult> {
        if request.authorization_code.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "authorization code is required".to_string(),
                field: Some("authorization_code".to_string()),
            });
        }

        let payload = serde_json::json!({
            "authorization_code": request.authorization_code,
            "email": request.email,
            "amount": request.amount_minor,
            "currency": request.currency,
            "reference": request.reference,
            "metadata": request.metadata,
        });

        // Captures move money: a lost response is surfaced, never replayed.
        let raw: PaystackEnvelope<PaystackChargeData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/transaction/charge_authorization"),
                Some(&self.config.secret_key),
                Some(&payload),
                RetryPolicy::Never,
            )
            .await?;

        let data = raw.into_data()?;
        let status = GatewayTransactionStatus::from_provider(&data.status);
        if !status.is_success() {
            warn!(
                reference = ?data.reference,
                status = %data.status,
                gateway_response = ?data.gateway_response,
                "paystack capture not successful"
            );
        }

        Ok(ChargeResult {
            status,
            raw_status: data.status,
            reference: data.reference,
            gateway_response: data.gateway_response,
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key);
        verify_hmac_sha512_hex(payload, secret, signature)
    }

    fn name(&self) -> ProviderName {
        ProviderName::Paystack
    }
}

fn initialize_payload(request: &InitializeTransactionRequest) -> JsonValue {
    let mut payload = serde_json::json!({
        "email": request.email,
        "amount": request.amount_minor,
        "currency": request.currency,
        "reference": request.reference,
        "callback_url": request.callback_url,
        "metadata": request.metadata,
    });
    if let Some(channels) = &request.channels {
        payload["channels"] = serde_json::json!(channels);
    }
    payload
}

/// Paystack sends metadata back either as an object or as a JSON-encoded string
fn normalize_metadata(value: Option<JsonValue>) -> Option<JsonValue> {
    match value {
        Some(JsonValue::String(s)) => {
            if s.trim().is_empty() {
                None
            } else {
                Some(serde_json::from_str(&s).unwrap_or(JsonValue::String(s)))
            }
        }
        Some(JsonValue::Object(map)) => Some(JsonValue::Object(map)),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

impl<T> PaystackEnvelope<T> {
    fn into_data(self) -> PaymentResult<T> {
        if !self.status {
            return Err(PaystackProvider::rejected(self.message));
        }
        self.data.ok_or_else(|| {
            PaystackProvider::rejected(format!("response without data: {}", self.message))
        })
    }
}

#[derive(Debug, Deserialize)]
struct PaystackInitializeData {
    authorization_url: String,
    #[serde(default)]
    access_code: Option<String>,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct PaystackVerifyData {
    #[serde(default)]
    reference: Option<String>,
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
    status: String,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
    #[serde(default)]
    metadata: Option<JsonValue>,
    #[serde(default)]
    customer: Option<PaystackCustomer>,
    #[serde(default)]
    authorization: Option<PaystackAuthorization>,
}

impl PaystackVerifyData {
    fn into_verified(self, requested_reference: &str) -> VerifiedTransaction {
        let customer = self
            .customer
            .map(|c| GatewayCustomer {
                email: c.email,
                first_name: c.first_name,
                last_name: c.last_name,
            })
            .unwrap_or_default();

        let authorization = self.authorization.and_then(|a| {
            a.authorization_code
                .filter(|code| !code.trim().is_empty())
                .map(|authorization_code| CardAuthorization {
                    authorization_code,
                    reusable: a.reusable.unwrap_or(false),
                    channel: a.channel,
                })
        });

        VerifiedTransaction {
            reference: self
                .reference
                .unwrap_or_else(|| requested_reference.trim().to_string()),
            status: GatewayTransactionStatus::from_provider(&self.status),
            raw_status: self.status,
            amount_minor: self.amount,
            currency: self.currency.unwrap_or_default(),
            customer,
            metadata: normalize_metadata(self.metadata),
            created_at: self.created_at,
            paid_at: self.paid_at,
            authorization,
            gateway_response: self.gateway_response,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaystackCustomer {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaystackAuthorization {
    #[serde(default)]
    authorization_code: Option<String>,
    #[serde(default)]
    reusable: Option<bool>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaystackChargeData {
    status: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::PaymentChannel;
    use crate::payments::utils::sign_hmac_sha512_hex;

    fn provider() -> PaystackProvider {
        PaystackProvider::new(PaystackConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: Some("whsec_test".to_string()),
            base_url: "https://api.paystack.co/".to_string(),
            timeout_secs: 5,
            max_retries: 1,
        })
        .expect("provider init should succeed")
    }

    fn init_request(channels: Option<Vec<PaymentChannel>>) -> InitializeTransactionRequest {
        InitializeTransactionRequest {
            amount_minor: 17000,
            currency: "NGN".to_string(),
            email: "ada@example.com".to_string(),
            reference: "order_1".to_string(),
            callback_url: "https://shop.test/callback".to_string(),
            metadata: serde_json::json!({"orderId": "order_1", "method": "POD"}),
            channels,
        }
    }

    #[test]
    fn missing_secret_key_is_rejected() {
        assert!(PaystackProvider::new(PaystackConfig::default()).is_err());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            provider().endpoint("/transaction/initialize"),
            "https://api.paystack.co/transaction/initialize"
        );
    }

    #[test]
    fn initialize_payload_restricts_channels_when_requested() {
        let payload = initialize_payload(&init_request(Some(vec![PaymentChannel::Card])));
        assert_eq!(payload["amount"], 17000);
        assert_eq!(payload["reference"], "order_1");
        assert_eq!(payload["channels"], serde_json::json!(["card"]));

        let payload = initialize_payload(&init_request(None));
        assert!(payload.get("channels").is_none());
    }

    #[test]
    fn verify_response_is_mapped() {
        let body = serde_json::json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 4099260516u64,
                "status": "success",
                "reference": "order_1",
                "amount": 17000,
                "currency": "NGN",
                "gateway_response": "Successful",
                "paid_at": "2026-10-01T10:00:00.000Z",
                "created_at": "2026-10-01T09:59:00.000Z",
                "channel": "card",
                "metadata": "{\"orderId\":\"order_1\",\"method\":\"POD\"}",
                "customer": {"email": "ada@example.com", "first_name": "Ada", "last_name": null},
                "authorization": {
                    "authorization_code": "AUTH_8dfhjjdt",
                    "reusable": true,
                    "channel": "card"
                }
            }
        });
        let envelope: PaystackEnvelope<PaystackVerifyData> =
            serde_json::from_value(body).expect("deserialization should succeed");
        let verified = envelope
            .into_data()
            .expect("status is true")
            .into_verified("order_1");

        assert!(verified.status.is_success());
        assert_eq!(verified.amount_minor, 17000);
        assert_eq!(verified.customer.display_name().as_deref(), Some("Ada"));
        assert_eq!(
            verified.metadata.as_ref().and_then(|m| m["orderId"].as_str()),
            Some("order_1")
        );
        let authorization = verified.authorization.expect("authorization present");
        assert_eq!(authorization.authorization_code, "AUTH_8dfhjjdt");
        assert!(authorization.reusable);
    }

    #[test]
    fn rejected_envelope_is_provider_error() {
        let body = serde_json::json!({
            "status": false,
            "message": "Transaction reference not found",
            "data": null
        });
        let envelope: PaystackEnvelope<PaystackVerifyData> =
            serde_json::from_value(body).expect("deserialization should succeed");
        match envelope.into_data() {
            Err(PaymentError::ProviderError { message, .. }) => {
                assert_eq!(message, "Transaction reference not found")
            }
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_metadata_is_dropped() {
        assert_eq!(normalize_metadata(Some(JsonValue::String(String::new()))), None);
        assert_eq!(normalize_metadata(Some(serde_json::json!(0))), None);
        assert_eq!(normalize_metadata(None), None);
    }

    #[test]
    fn webhook_signature_uses_webhook_secret() {
        let provider = provider();
        let payload = br#"{"event":"charge.success"}"#;
        let signature = sign_hmac_sha512_hex(payload, "whsec_test").expect("signature");

        assert!(provider.verify_webhook_signature(payload, &signature));
        assert!(!provider.verify_webhook_signature(payload, "invalid_signature"));
    }
}
