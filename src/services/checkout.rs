//! Checkout flow
//!
//! Validates the submission, stores a pending order and opens a gateway
//! transaction whose reference is the order id.

use crate::config::CheckoutConfig;
use crate::database::order_repository::{cart_total, CustomerInfo, LineItem, Order, OrderRepository};
use crate::database::transaction_repository::{Transaction, TransactionRepository};
use crate::error::{AppError, AppErrorKind, AppResult, ValidationError};
use crate::logging::mask_email;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{InitializeTransactionRequest, PaymentChannel};
use crate::payments::utils::to_minor_units;
use crate::services::order_state::CheckoutMethod;
use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Body of `POST /checkout`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub cart: Option<Vec<LineItem>>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub method: CheckoutMethod,
}

/// An opened payment session
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub order: Order,
    pub authorization_url: String,
    pub reference: String,
}

pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    transactions: Arc<dyn TransactionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: CheckoutConfig,
    email_pattern: Regex,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        transactions: Arc<dyn TransactionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: CheckoutConfig,
    ) -> AppResult<Self> {
        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| AppError::configuration(format!("invalid e-mail pattern: {}", e)))?;

        Ok(Self {
            orders,
            transactions,
            gateway,
            config,
            email_pattern,
        })
    }

    pub async fn checkout(&self, request: CheckoutRequest) -> AppResult<CheckoutSession> {
        let (cart, customer) = self.validate(request.cart, request.customer_info)?;
        let method = request.method;

        let total = cart_total(&cart)
            .ok_or_else(|| AppError::invalid_field("cart", "order total too large"))?;
        let amount_minor = to_minor_units(total)?;
        if amount_minor <= 0 {
            return Err(AppError::invalid_field("cart", "order total must be positive"));
        }

        let order_id = Uuid::new_v4().to_string();
        let order = self
            .orders
            .insert(Order::new(
                order_id.clone(),
                cart,
                customer,
                method,
                total,
                Utc::now(),
            ))
            .await?;

        let channels = match method {
            // An authorization hold needs a reusable card
            CheckoutMethod::PayOnDelivery => Some(vec![PaymentChannel::Card]),
            CheckoutMethod::Standard => None,
        };

        let initialize = InitializeTransactionRequest {
            amount_minor,
            currency: self.config.currency.clone(),
            email: order.customer_info.email.clone(),
            reference: order_id.clone(),
            callback_url: self.config.callback_url(),
            metadata: serde_json::json!({
                "orderId": order.id,
                "method": order.method,
                "customerInfo": order.customer_info,
                "cart": order.cart,
            }),
            channels,
        };

        let initialized = match self.gateway.initialize_transaction(initialize).await {
            Ok(initialized) => initialized,
            Err(e) => {
                error!(
                    order_id = %order_id,
                    error = %e,
                    "Transaction initialization failed; order left pending without a transaction"
                );
                return Err(AppError::from(e).with_context(format!("checkout {}", order_id)));
            }
        };

        self.transactions
            .save(Transaction::initialized(
                order_id.clone(),
                initialized.authorization_url.clone(),
                method,
            ))
            .await?;

        info!(
            order_id = %order_id,
            method = %method,
            amount_minor,
            email = %mask_email(&order.customer_info.email),
            "Checkout initialized"
        );

        Ok(CheckoutSession {
            order,
            authorization_url: initialized.authorization_url,
            reference: order_id,
        })
    }

    fn validate(
        &self,
        cart: Option<Vec<LineItem>>,
        customer: Option<CustomerInfo>,
    ) -> AppResult<(Vec<LineItem>, CustomerInfo)> {
        let cart = match cart {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(AppError::new(AppErrorKind::Validation(ValidationError::EmptyCart))),
        };

        for (index, item) in cart.iter().enumerate() {
            validate_line_item(index, item)?;
        }

        let mut customer = customer.ok_or_else(|| AppError::missing_field("customerInfo"))?;
        customer.name = customer.name.trim().to_string();
        customer.email = customer.email.trim().to_string();

        if customer.name.is_empty() {
            return Err(AppError::missing_field("customerInfo.name"));
        }
        if customer.email.is_empty() {
            return Err(AppError::missing_field("customerInfo.email"));
        }
        if !self.email_pattern.is_match(&customer.email) {
            return Err(AppError::invalid_field(
                "customerInfo.email",
                "not a valid e-mail address",
            ));
        }

        if self.config.require_contact_details {
            if is_blank(&customer.phone) {
                return Err(AppError::missing_field("customerInfo.phone"));
            }
            if is_blank(&customer.address) {
                return Err(AppError::missing_field("customerInfo.address"));
            }
        }

        Ok((cart, customer))
    }
}

fn validate_line_item(index: usize, item: &LineItem) -> AppResult<()> {
    let field = |name: &str| format!("cart[{}].{}", index, name);

    if item.name.trim().is_empty() {
        return Err(AppError::missing_field(field("name")));
    }
    if item.quantity == 0 {
        return Err(AppError::invalid_field(field("quantity"), "must be at least 1"));
    }
    if item.price <= Decimal::ZERO {
        return Err(AppError::invalid_field(field("price"), "must be greater than zero"));
    }
    if item.price.normalize().scale() > 2 {
        return Err(AppError::invalid_field(
            field("price"),
            "must have at most two decimal places",
        ));
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}
