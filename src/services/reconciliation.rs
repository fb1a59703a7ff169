//! Payment reconciliation
//!
//! Turns gateway evidence into order transitions: verification of a
//! reference after the payer returns, and pay-on-delivery card
//! authorizations. Every mutation runs under the order's lock and is
//! persisted with a compare-and-swap on the prior status.

use crate::config::CheckoutConfig;
use crate::database::error::DatabaseError;
use crate::database::order_repository::{
    cart_total, CustomerInfo, LineItem, Order, OrderRepository,
};
use crate::database::transaction_repository::TransactionRepository;
use crate::error::{AppError, AppResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::VerifiedTransaction;
use crate::payments::utils::{from_minor_units, to_minor_units};
use crate::services::fulfillment::FulfillmentTrigger;
use crate::services::locks::OrderLocks;
use crate::services::order_state::{CheckoutMethod, OrderStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of verifying a reference with the gateway
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// The order is settled after this verification
    pub success: bool,
    /// Raw gateway status (`success`, `abandoned`, ...)
    pub status: String,
    pub reference: String,
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct PaymentReconciler {
    orders: Arc<dyn OrderRepository>,
    transactions: Arc<dyn TransactionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    fulfillment: Arc<dyn FulfillmentTrigger>,
    locks: Arc<OrderLocks>,
    config: CheckoutConfig,
}

impl PaymentReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        transactions: Arc<dyn TransactionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        fulfillment: Arc<dyn FulfillmentTrigger>,
        locks: Arc<OrderLocks>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            orders,
            transactions,
            gateway,
            fulfillment,
            locks,
            config,
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Verify `reference` with the gateway and settle the order on success.
    ///
    /// Re-verifying a settled order returns it unchanged.
    pub async fn verify_payment(&self, reference: &str) -> AppResult<VerificationOutcome> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::missing_field("reference"));
        }

        let verified = self.gateway.verify_transaction(reference).await?;
        let _guard = self.locks.acquire(reference).await;

        let existing = self.orders.find_by_id(reference).await?;
        let outcome = |success: bool, order: Option<Order>, message: Option<String>| {
            VerificationOutcome {
                success,
                status: verified.raw_status.clone(),
                reference: reference.to_string(),
                order,
                message,
            }
        };

        if !verified.status.is_success() {
            info!(
                reference = %reference,
                gateway_status = %verified.raw_status,
                "Payment not successful"
            );
            let settled = existing.as_ref().map_or(false, Order::is_settled);
            return Ok(outcome(
                settled,
                existing,
                Some(format!("Payment not successful (status: {})", verified.raw_status)),
            ));
        }

        let order = match existing {
            Some(order) => order,
            None if self.config.recover_unknown_orders => {
                match self.recover_order(reference, &verified).await? {
                    Some(order) => order,
                    None => {
                        return Ok(outcome(
                            false,
                            None,
                            Some("Order could not be recovered from gateway data".to_string()),
                        ))
                    }
                }
            }
            None => return Err(AppError::not_found(reference)),
        };

        let expected_minor = to_minor_units(order.total_amount)?;
        if verified.amount_minor != expected_minor {
            warn!(
                reference = %reference,
                expected_minor,
                reported_minor = verified.amount_minor,
                "Verified amount does not match order total"
            );
            let settled = order.is_settled();
            return Ok(outcome(
                settled,
                Some(order),
                Some(format!(
                    "Amount mismatch: order total is {} but gateway reported {}",
                    expected_minor, verified.amount_minor
                )),
            ));
        }

        self.transactions
            .mark_verified(reference, order.method, Utc::now())
            .await?;

        match (order.method, order.status) {
            (CheckoutMethod::Standard, OrderStatus::Pending) => {
                let mut paid = order;
                paid.mark_paid(Utc::now())?;
                let paid = self.persist(OrderStatus::Pending, paid).await?;
                info!(order_id = %paid.id, "Order paid");
                Ok(outcome(true, Some(paid), None))
            }
            (CheckoutMethod::PayOnDelivery, OrderStatus::Pending) => {
                let code = verified
                    .authorization
                    .as_ref()
                    .map(|a| a.authorization_code.trim())
                    .filter(|code| !code.is_empty());

                match code {
                    Some(code) => {
                        let mut authorized = order;
                        authorized.mark_authorized(code, Utc::now())?;
                        let authorized = self.persist(OrderStatus::Pending, authorized).await?;
                        info!(order_id = %authorized.id, "Order authorized from verification");
                        Ok(outcome(true, Some(authorized), None))
                    }
                    None => Ok(outcome(
                        false,
                        Some(order),
                        Some("Gateway returned no card authorization".to_string()),
                    )),
                }
            }
            (_, status) => {
                info!(
                    order_id = %order.id,
                    status = %status,
                    "Order already settled; verification is a no-op"
                );
                Ok(outcome(order.is_settled(), Some(order), None))
            }
        }
    }

    /// Rebuild a lost order from the verified transaction.
    ///
    /// Only references that checkout issued qualify: the metadata must name
    /// this reference as its `orderId`, and the rebuilt cart must add up to
    /// the verified amount. Nothing is stored otherwise.
    async fn recover_order(
        &self,
        reference: &str,
        verified: &VerifiedTransaction,
    ) -> AppResult<Option<Order>> {
        let metadata = verified.metadata.clone().unwrap_or_default();

        match metadata.get("orderId").and_then(|v| v.as_str()) {
            Some(order_id) if order_id == reference => {}
            other => {
                warn!(
                    reference = %reference,
                    metadata_order_id = ?other,
                    "Refusing to recover order not issued by checkout"
                );
                return Ok(None);
            }
        }

        let method: CheckoutMethod = metadata
            .get("method")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let cart: Vec<LineItem> = metadata
            .get("cart")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .filter(|cart: &Vec<LineItem>| !cart.is_empty())
            .unwrap_or_else(|| {
                vec![LineItem {
                    id: reference.to_string(),
                    name: "Recovered order".to_string(),
                    price: from_minor_units(verified.amount_minor),
                    quantity: 1,
                }]
            });

        let totals = cart_total(&cart)
            .and_then(|total| to_minor_units(total).ok().map(|minor| (total, minor)));
        let total = match totals {
            Some((total, minor)) if minor == verified.amount_minor => total,
            _ => {
                warn!(
                    reference = %reference,
                    reported_minor = verified.amount_minor,
                    "Refusing to recover order whose cart does not match the verified amount"
                );
                return Ok(None);
            }
        };

        let customer = metadata
            .get("customerInfo")
            .cloned()
            .and_then(|v| serde_json::from_value::<CustomerInfo>(v).ok())
            .unwrap_or_else(|| CustomerInfo {
                name: verified.customer.display_name().unwrap_or_default(),
                email: verified.customer.email.clone().unwrap_or_default(),
                phone: None,
                address: None,
            });

        let created_at = verified
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let order = Order::new(
            reference.to_string(),
            cart,
            customer,
            method,
            total,
            created_at,
        );
        warn!(
            reference = %reference,
            method = %method,
            "Recovering unknown order from gateway data"
        );

        match self.orders.insert(order).await {
            Ok(order) => Ok(Some(order)),
            Err(DatabaseError::Duplicate { id }) => Ok(self.orders.find_by_id(&id).await?),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Pay-on-delivery authorization
    // =========================================================================

    /// Record a card authorization for a pay-on-delivery order.
    ///
    /// Repeating the call with the same code, or after completion, returns
    /// the stored order.
    pub async fn authorize_pay_on_delivery(
        &self,
        reference: &str,
        authorization_code: &str,
    ) -> AppResult<Order> {
        let reference = reference.trim();
        let authorization_code = authorization_code.trim();
        if authorization_code.is_empty() {
            return Err(AppError::missing_field("auth_code"));
        }
        if reference.is_empty() {
            return Err(AppError::missing_field("reference"));
        }

        if self.config.verify_pod_authorization {
            self.confirm_authorization_with_gateway(reference, authorization_code)
                .await?;
        }

        let _guard = self.locks.acquire(reference).await;
        let order = self
            .orders
            .find_by_id(reference)
            .await?
            .ok_or_else(|| AppError::not_found(reference))?;

        if order.method != CheckoutMethod::PayOnDelivery {
            return Err(AppError::conflict(
                reference,
                "authorize",
                "order does not use pay-on-delivery",
            ));
        }

        match order.status {
            OrderStatus::Pending => {
                let mut authorized = order;
                authorized.mark_authorized(authorization_code, Utc::now())?;
                let authorized = self.persist(OrderStatus::Pending, authorized).await?;
                info!(order_id = %authorized.id, "Order authorized");
                Ok(authorized)
            }
            OrderStatus::Authorized
                if order.authorization_code.as_deref() == Some(authorization_code) =>
            {
                Ok(order)
            }
            OrderStatus::Authorized => Err(AppError::conflict(
                reference,
                "authorize",
                "order already holds a different authorization",
            )),
            OrderStatus::Completed => Ok(order),
            OrderStatus::Paid => Err(AppError::conflict(
                reference,
                "authorize",
                "order is already paid",
            )),
        }
    }

    async fn confirm_authorization_with_gateway(
        &self,
        reference: &str,
        authorization_code: &str,
    ) -> AppResult<()> {
        let verified = self.gateway.verify_transaction(reference).await?;
        let reported = verified
            .authorization
            .as_ref()
            .map(|a| a.authorization_code.as_str());

        if verified.status.is_success() && reported == Some(authorization_code) {
            return Ok(());
        }

        warn!(
            reference = %reference,
            gateway_status = %verified.raw_status,
            "Authorization code not confirmed by gateway"
        );
        Err(AppError::invalid_field(
            "auth_code",
            "authorization could not be confirmed with the payment gateway",
        ))
    }

    /// Write a transition and hand the order to fulfillment
    async fn persist(&self, expected: OrderStatus, order: Order) -> AppResult<Order> {
        let order = self.orders.update_if_status(expected, order).await?;
        self.fulfillment.trigger(&order);
        Ok(order)
    }
}
