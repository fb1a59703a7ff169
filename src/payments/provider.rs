use crate::payments::error::PaymentResult;
use crate::payments::types::{
    ChargeAuthorizationRequest, ChargeResult, InitializeTransactionRequest,
    InitializedTransaction, ProviderName, VerifiedTransaction,
};
use async_trait::async_trait;

/// Remote payment gateway.
///
/// Every amount crossing this boundary is in minor units. Failures of the
/// remote call (transport or non-2xx) come back as `PaymentError`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> PaymentResult<InitializedTransaction>;

    async fn verify_transaction(&self, reference: &str) -> PaymentResult<VerifiedTransaction>;

    async fn charge_authorization(
        &self,
        request: ChargeAuthorizationRequest,
    ) -> PaymentResult<ChargeResult>;

    /// Check a webhook signature against the raw request body
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;

    fn name(&self) -> ProviderName;
}
