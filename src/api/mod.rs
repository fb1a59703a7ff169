//! HTTP surface
//!
//! `router` builds the complete application so tests can drive it without
//! binding a socket.

pub mod callbacks;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{CheckoutConfig, ServerConfig};
use crate::database::order_repository::OrderRepository;
use crate::database::transaction_repository::TransactionRepository;
use crate::error::AppResult;
use crate::health::HealthChecker;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::payments::provider::PaymentGateway;
use crate::services::checkout::CheckoutService;
use crate::services::delivery::DeliveryService;
use crate::services::fulfillment::FulfillmentTrigger;
use crate::services::locks::OrderLocks;
use crate::services::reconciliation::PaymentReconciler;
use crate::services::webhook_processor::WebhookProcessor;

/// Everything the flows are built from
pub struct AppDependencies {
    pub orders: Arc<dyn OrderRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub fulfillment: Arc<dyn FulfillmentTrigger>,
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub delivery: Arc<DeliveryService>,
    pub webhooks: Arc<WebhookProcessor>,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(config: &CheckoutConfig, deps: AppDependencies) -> AppResult<Self> {
        let locks = Arc::new(OrderLocks::new());

        let checkout = Arc::new(CheckoutService::new(
            deps.orders.clone(),
            deps.transactions.clone(),
            deps.gateway.clone(),
            config.clone(),
        )?);
        let reconciler = Arc::new(PaymentReconciler::new(
            deps.orders.clone(),
            deps.transactions.clone(),
            deps.gateway.clone(),
            deps.fulfillment.clone(),
            locks.clone(),
            config.clone(),
        ));
        let delivery = Arc::new(DeliveryService::new(
            deps.orders.clone(),
            deps.gateway.clone(),
            locks.clone(),
            config.currency.clone(),
        ));
        let webhooks = Arc::new(WebhookProcessor::new(deps.gateway, reconciler.clone()));
        let health = HealthChecker::new(deps.orders.clone(), deps.fulfillment, locks);

        Ok(Self {
            orders: deps.orders,
            checkout,
            reconciler,
            delivery,
            webhooks,
            health,
        })
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/checkout", post(checkout::create_checkout))
        .route("/callback", get(callbacks::payment_callback))
        .route("/pod-callback", get(callbacks::pod_callback))
        .route("/delivery/confirm", post(orders::confirm_delivery))
        .route("/order/{order_id}", get(orders::get_order))
        .route("/orders", get(orders::list_orders))
        .route("/webhooks/paystack", post(webhooks::paystack_webhook))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(server)),
        )
}
