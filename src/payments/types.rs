use crate::payments::error::PaymentError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Paystack,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Paystack => "paystack",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "paystack" => Ok(ProviderName::Paystack),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

/// Payment channels a payer may be offered on the hosted checkout page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Card,
    Bank,
    Ussd,
    Qr,
    MobileMoney,
    BankTransfer,
}

/// Transaction status as reported by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayTransactionStatus {
    Success,
    Pending,
    Failed,
    Abandoned,
    Reversed,
    Unknown,
}

impl GatewayTransactionStatus {
    pub fn from_provider(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "success" => GatewayTransactionStatus::Success,
            "pending" | "ongoing" | "processing" | "queued" => GatewayTransactionStatus::Pending,
            "failed" => GatewayTransactionStatus::Failed,
            "abandoned" => GatewayTransactionStatus::Abandoned,
            "reversed" => GatewayTransactionStatus::Reversed,
            _ => GatewayTransactionStatus::Unknown,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GatewayTransactionStatus::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeTransactionRequest {
    /// Amount in minor units (kobo, cents)
    pub amount_minor: i64,
    pub currency: String,
    pub email: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: JsonValue,
    /// Restrict the hosted page to these channels; `None` offers everything
    pub channels: Option<Vec<PaymentChannel>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayCustomer {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl GatewayCustomer {
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Reusable card authorization captured during a transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardAuthorization {
    pub authorization_code: String,
    pub reusable: bool,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: GatewayTransactionStatus,
    /// Status string exactly as the provider sent it
    pub raw_status: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: GatewayCustomer,
    pub metadata: Option<JsonValue>,
    pub created_at: Option<String>,
    pub paid_at: Option<String>,
    pub authorization: Option<CardAuthorization>,
    pub gateway_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeAuthorizationRequest {
    pub authorization_code: String,
    pub email: String,
    /// Amount in minor units (kobo, cents)
    pub amount_minor: i64,
    pub currency: String,
    /// Unique per capture so a duplicate capture is rejected upstream
    pub reference: String,
    /// Echoed back on the capture's `charge.success` webhook
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResult {
    pub status: GatewayTransactionStatus,
    pub raw_status: String,
    pub reference: Option<String>,
    pub gateway_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_strings_are_mapped() {
        assert!(GatewayTransactionStatus::from_provider("success").is_success());
        assert_eq!(
            GatewayTransactionStatus::from_provider("abandoned"),
            GatewayTransactionStatus::Abandoned
        );
        assert_eq!(
            GatewayTransactionStatus::from_provider("ongoing"),
            GatewayTransactionStatus::Pending
        );
        assert_eq!(
            GatewayTransactionStatus::from_provider("something-new"),
            GatewayTransactionStatus::Unknown
        );
    }

    #[test]
    fn channels_serialize_in_provider_format() {
        let json = serde_json::to_value(vec![PaymentChannel::Card, PaymentChannel::BankTransfer])
            .expect("serialization should succeed");
        assert_eq!(json, serde_json::json!(["card", "bank_transfer"]));
    }

    #[test]
    fn customer_display_name_joins_parts() {
        let customer = GatewayCustomer {
            email: Some("ada@example.com".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some(" ".to_string()),
        };
        assert_eq!(customer.display_name().as_deref(), Some("Ada"));
        assert_eq!(GatewayCustomer::default().display_name(), None);
    }
}
