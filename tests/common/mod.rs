//! Shared fixtures: a scripted in-process gateway and a recording
//! fulfillment trigger.

#![allow(dead_code)]

use async_trait::async_trait;
use grundy_backend::api::{AppDependencies, AppState};
use grundy_backend::config::CheckoutConfig;
use grundy_backend::database::{
    InMemoryOrderRepository, InMemoryTransactionRepository, Order, OrderRepository,
    TransactionRepository,
};
use grundy_backend::payments::error::{PaymentError, PaymentResult};
use grundy_backend::payments::provider::PaymentGateway;
use grundy_backend::payments::types::{
    CardAuthorization, ChargeAuthorizationRequest, ChargeResult, GatewayCustomer,
    GatewayTransactionStatus, InitializeTransactionRequest, InitializedTransaction, ProviderName,
    VerifiedTransaction,
};
use grundy_backend::services::fulfillment::FulfillmentTrigger;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WEBHOOK_SIGNATURE: &str = "valid-signature";

#[derive(Default)]
struct GatewayScript {
    initialize_calls: Vec<InitializeTransactionRequest>,
    verify_calls: Vec<String>,
    charge_calls: Vec<ChargeAuthorizationRequest>,
    verifications: HashMap<String, VerifiedTransaction>,
    fail_initialize: bool,
    charge_status: Option<String>,
    fail_charge: bool,
}

/// Gateway double; responses are scripted per reference and every call is recorded
#[derive(Default)]
pub struct MockGateway {
    script: Mutex<GatewayScript>,
    charge_delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture calls take this long, widening race windows
    pub fn with_charge_delay(delay: Duration) -> Self {
        Self {
            script: Mutex::new(GatewayScript::default()),
            charge_delay: Some(delay),
        }
    }

    pub fn fail_initialize(&self) {
        self.script.lock().unwrap().fail_initialize = true;
    }

    pub fn fail_charge(&self) {
        self.script.lock().unwrap().fail_charge = true;
    }

    pub fn set_charge_status(&self, status: &str) {
        self.script.lock().unwrap().charge_status = Some(status.to_string());
    }

    /// Script the verification result for `reference`
    pub fn script_verification(&self, verified: VerifiedTransaction) {
        self.script
            .lock()
            .unwrap()
            .verifications
            .insert(verified.reference.clone(), verified);
    }

    pub fn initialize_calls(&self) -> Vec<InitializeTransactionRequest> {
        self.script.lock().unwrap().initialize_calls.clone()
    }

    pub fn verify_calls(&self) -> Vec<String> {
        self.script.lock().unwrap().verify_calls.clone()
    }

    pub fn charge_calls(&self) -> Vec<ChargeAuthorizationRequest> {
        self.script.lock().unwrap().charge_calls.clone()
    }
}

/// A successful verification for `reference` of `amount_minor`
pub fn verified(reference: &str, amount_minor: i64) -> VerifiedTransaction {
    VerifiedTransaction {
        reference: reference.to_string(),
        status: GatewayTransactionStatus::Success,
        raw_status: "success".to_string(),
        amount_minor,
        currency: "NGN".to_string(),
        customer: GatewayCustomer {
            email: Some("ada@example.com".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Obi".to_string()),
        },
        metadata: None,
        created_at: Some("2026-10-01T09:30:00.000Z".to_string()),
        paid_at: Some("2026-10-01T09:31:00.000Z".to_string()),
        authorization: None,
        gateway_response: Some("Approved".to_string()),
    }
}

pub fn with_status(mut verified: VerifiedTransaction, status: &str) -> VerifiedTransaction {
    verified.status = GatewayTransactionStatus::from_provider(status);
    verified.raw_status = status.to_string();
    verified
}

pub fn with_authorization(mut verified: VerifiedTransaction, code: &str) -> VerifiedTransaction {
    verified.authorization = Some(CardAuthorization {
        authorization_code: code.to_string(),
        reusable: true,
        channel: Some("card".to_string()),
    });
    verified
}

pub fn with_metadata(mut verified: VerifiedTransaction, metadata: JsonValue) -> VerifiedTransaction {
    verified.metadata = Some(metadata);
    verified
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> PaymentResult<InitializedTransaction> {
        let mut script = self.script.lock().unwrap();
        script.initialize_calls.push(request.clone());
        if script.fail_initialize {
            return Err(PaymentError::NetworkError {
                message: "connection refused".to_string(),
            });
        }
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.paystack.test/{}", request.reference),
            access_code: Some("acc_test".to_string()),
            reference: request.reference,
        })
    }

    async fn verify_transaction(&self, reference: &str) -> PaymentResult<VerifiedTransaction> {
        let mut script = self.script.lock().unwrap();
        script.verify_calls.push(reference.to_string());
        script
            .verifications
            .get(reference)
            .cloned()
            .ok_or_else(|| PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: "Transaction reference not found".to_string(),
                provider_code: Some("400".to_string()),
                retryable: false,
            })
    }

    async fn charge_authorization(
        &self,
        request: ChargeAuthorizationRequest,
    ) -> PaymentResult<ChargeResult> {
        if let Some(delay) = self.charge_delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        script.charge_calls.push(request.clone());
        if script.fail_charge {
            return Err(PaymentError::NetworkError {
                message: "timed out".to_string(),
            });
        }
        let raw_status = script
            .charge_status
            .clone()
            .unwrap_or_else(|| "success".to_string());
        Ok(ChargeResult {
            status: GatewayTransactionStatus::from_provider(&raw_status),
            raw_status,
            reference: Some(request.reference),
            gateway_response: None,
        })
    }

    fn verify_webhook_signature(&self, _payload: &[u8], signature: &str) -> bool {
        signature == WEBHOOK_SIGNATURE
    }

    fn name(&self) -> ProviderName {
        ProviderName::Paystack
    }
}

/// Fulfillment trigger that remembers what it was handed
#[derive(Default)]
pub struct RecordingFulfillment {
    triggered: Mutex<Vec<String>>,
}

impl RecordingFulfillment {
    pub fn triggered(&self) -> Vec<String> {
        self.triggered.lock().unwrap().clone()
    }
}

impl FulfillmentTrigger for RecordingFulfillment {
    fn trigger(&self, order: &Order) {
        self.triggered.lock().unwrap().push(order.id.clone());
    }
}

pub fn checkout_config() -> CheckoutConfig {
    CheckoutConfig {
        frontend_url: "https://shop.test".to_string(),
        callback_path: "/callback".to_string(),
        currency: "NGN".to_string(),
        require_contact_details: false,
        verify_pod_authorization: false,
        recover_unknown_orders: true,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    pub fulfillment: Arc<RecordingFulfillment>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub transactions: Arc<InMemoryTransactionRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(checkout_config(), MockGateway::new())
    }

    pub fn with(config: CheckoutConfig, gateway: MockGateway) -> Self {
        let gateway = Arc::new(gateway);
        let fulfillment = Arc::new(RecordingFulfillment::default());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let transactions = Arc::new(InMemoryTransactionRepository::new());

        let state = AppState::new(
            &config,
            AppDependencies {
                orders: orders.clone() as Arc<dyn OrderRepository>,
                transactions: transactions.clone() as Arc<dyn TransactionRepository>,
                gateway: gateway.clone() as Arc<dyn PaymentGateway>,
                fulfillment: fulfillment.clone() as Arc<dyn FulfillmentTrigger>,
            },
        )
        .expect("state builds");

        Self {
            state,
            gateway,
            fulfillment,
            orders,
            transactions,
        }
    }
}

/// The two-line cart from the storefront: 25 x 2 + 120 x 1 = 170
pub fn sample_cart_json() -> JsonValue {
    serde_json::json!([
        {"id": 1, "name": "Fresh Tomatoes", "price": 25, "quantity": 2, "category": "vegetables"},
        {"id": 2, "name": "Rice (5kg)", "price": 120, "quantity": 1, "category": "grains"}
    ])
}

pub fn checkout_body(method: &str) -> JsonValue {
    serde_json::json!({
        "cart": sample_cart_json(),
        "customerInfo": {
            "name": "Ada Obi",
            "email": "ada@example.com",
            "phone": "08012345678",
            "address": "12 Marina, Lagos"
        },
        "method": method
    })
}
