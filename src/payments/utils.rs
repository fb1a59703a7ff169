use crate::payments::error::{PaymentError, PaymentResult};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sha2::Sha512;
use std::time::Duration;
use tracing::warn;

/// Whether a request may be replayed after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Safe to replay (reads such as transaction verification)
    Idempotent,
    /// Sent at most once (initialization, captures)
    Never,
}

/// Longest server-requested pause honoured before giving up on a retry
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// JSON-over-HTTPS client shared by gateway adapters
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// Send a request and decode the JSON body.
    ///
    /// Only `RetryPolicy::Idempotent` requests are replayed, and only for
    /// failures that report themselves retryable.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        retry: RetryPolicy,
    ) -> PaymentResult<T> {
        let attempts = match retry {
            RetryPolicy::Idempotent => self.max_retries + 1,
            RetryPolicy::Never => 1,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self
                .send_once(method.clone(), url, bearer_token, body)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= attempts || !err.is_retryable() {
                return Err(err);
            }

            let delay = match &err {
                PaymentError::RateLimitError {
                    retry_after_seconds: Some(secs),
                    ..
                } if *secs <= MAX_RETRY_AFTER_SECS => Duration::from_secs(*secs),
                _ => backoff(attempt),
            };
            warn!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Gateway request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
    ) -> PaymentResult<T> {
        let mut request = self.client.request(method, url).timeout(self.timeout);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| PaymentError::NetworkError {
            message: format!("gateway unreachable: {}", e),
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("gateway response interrupted: {}", e),
            })?;

        if status.is_success() {
            return serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: format!("invalid gateway JSON response: {}", e),
                provider_code: None,
                retryable: false,
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::RateLimitError {
                message: provider_message(&text),
                retry_after_seconds: retry_after,
            });
        }

        Err(PaymentError::ProviderError {
            provider: "paystack".to_string(),
            message: format!("HTTP {}: {}", status.as_u16(), provider_message(&text)),
            provider_code: Some(status.as_u16().to_string()),
            retryable: status.is_server_error(),
        })
    }
}

/// 250ms, 500ms, 1s, ... capped at 8s
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250u64.saturating_mul(1 << attempt.saturating_sub(1).min(5)))
}

/// Pull the `message` out of a provider error body, falling back to the raw text
fn provider_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Convert a major-unit amount (e.g. naira) to minor units (kobo).
///
/// Rejects negative amounts and anything finer than two decimal places.
pub fn to_minor_units(amount: Decimal) -> PaymentResult<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PaymentError::ValidationError {
            message: format!("amount cannot be negative: {}", amount),
            field: Some("amount".to_string()),
        });
    }

    let normalized = amount.normalize();
    if normalized.scale() > 2 {
        return Err(PaymentError::ValidationError {
            message: format!("amount has more than two decimal places: {}", amount),
            field: Some("amount".to_string()),
        });
    }

    normalized
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| PaymentError::ValidationError {
            message: format!("amount is too large: {}", amount),
            field: Some("amount".to_string()),
        })
}

/// Convert minor units back to a major-unit amount
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

type HmacSha512 = Hmac<Sha512>;

/// Check a hex-encoded HMAC-SHA512 signature in constant time
pub fn verify_hmac_sha512_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    let expected = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

pub fn sign_hmac_sha512_hex(payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}
