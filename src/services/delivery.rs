//! Delivery confirmation
//!
//! Completes an order once the rider hands it over. Pay-on-delivery orders
//! are captured here, exactly once.

use crate::database::order_repository::{Order, OrderRepository};
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::logging::mask_email;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::ChargeAuthorizationRequest;
use crate::payments::utils::to_minor_units;
use crate::services::locks::OrderLocks;
use crate::services::order_state::{CheckoutMethod, OrderStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct DeliveryService {
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    locks: Arc<OrderLocks>,
    currency: String,
}

const CAPTURE_SUFFIX: &str = "-capture";

/// Reference sent with the capture; stable per order so a repeated capture
/// is rejected by the gateway as a duplicate.
pub fn capture_reference(order_id: &str) -> String {
    format!("{}{}", order_id, CAPTURE_SUFFIX)
}

/// The order id behind a capture reference, or `None` for checkout references
pub fn captured_order_id(reference: &str) -> Option<&str> {
    reference
        .strip_suffix(CAPTURE_SUFFIX)
        .filter(|order_id| !order_id.is_empty())
}

impl DeliveryService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        locks: Arc<OrderLocks>,
        currency: String,
    ) -> Self {
        Self {
            orders,
            gateway,
            locks,
            currency,
        }
    }

    pub async fn confirm_delivery(&self, order_id: &str) -> AppResult<Order> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(AppError::missing_field("orderId"));
        }

        let _guard = self.locks.acquire(order_id).await;
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(order_id))?;

        match (order.method, order.status) {
            (CheckoutMethod::Standard, OrderStatus::Paid) => {
                let mut completed = order;
                completed.mark_completed(Utc::now())?;
                let completed = self
                    .orders
                    .update_if_status(OrderStatus::Paid, completed)
                    .await?;
                info!(order_id = %order_id, "Order delivered and completed");
                Ok(completed)
            }
            (CheckoutMethod::PayOnDelivery, OrderStatus::Authorized) => {
                self.capture_and_complete(order).await
            }
            (method, status) => Err(AppError::conflict(
                order_id,
                "confirm delivery of",
                format!("{} order is {}", method, status),
            )),
        }
    }

    async fn capture_and_complete(&self, order: Order) -> AppResult<Order> {
        let authorization_code = order
            .authorization_code
            .clone()
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| {
                AppError::conflict(
                    order.id.as_str(),
                    "confirm delivery of",
                    "no card authorization on file",
                )
            })?;

        let amount_minor = to_minor_units(order.total_amount)?;
        let request = ChargeAuthorizationRequest {
            authorization_code,
            email: order.customer_info.email.clone(),
            amount_minor,
            currency: self.currency.clone(),
            reference: capture_reference(&order.id),
            metadata: serde_json::json!({ "orderId": order.id, "capture": true }),
        };

        info!(
            order_id = %order.id,
            amount_minor,
            email = %mask_email(&order.customer_info.email),
            "Capturing pay-on-delivery authorization"
        );

        let charge = self.gateway.charge_authorization(request).await.map_err(|e| {
            error!(order_id = %order.id, error = %e, "Capture request failed");
            AppError::from(e).with_context(format!("capture {}", order.id))
        })?;

        if !charge.status.is_success() {
            warn!(
                order_id = %order.id,
                gateway_status = %charge.raw_status,
                "Capture declined; order stays authorized"
            );
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::PaymentDeclined {
                    order_id: order.id.clone(),
                    status: charge.raw_status,
                },
            )));
        }

        let mut completed = order;
        completed.mark_completed(Utc::now())?;
        let completed = self
            .orders
            .update_if_status(OrderStatus::Authorized, completed)
            .await?;
        info!(order_id = %completed.id, "Order captured and completed");
        Ok(completed)
    }
}
