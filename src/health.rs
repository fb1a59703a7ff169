//! Liveness and readiness reporting
//!
//! The order store decides health; a closed fulfillment queue only degrades
//! it, since payments keep settling without riders being assigned.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::database::order_repository::OrderRepository;
use crate::services::fulfillment::FulfillmentTrigger;
use crate::services::locks::OrderLocks;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self.status, HealthState::Unhealthy)
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }

    fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    orders: Arc<dyn OrderRepository>,
    fulfillment: Arc<dyn FulfillmentTrigger>,
    locks: Arc<OrderLocks>,
}

impl HealthChecker {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        fulfillment: Arc<dyn FulfillmentTrigger>,
        locks: Arc<OrderLocks>,
    ) -> Self {
        Self {
            orders,
            fulfillment,
            locks,
        }
    }

    /// Probe the order store and the fulfillment queue
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut overall_healthy = true;
        let mut degraded = false;

        // Order store
        let start = Instant::now();
        match timeout(Duration::from_secs(5), self.orders.count()).await {
            Ok(Ok(count)) => {
                let response_time = start.elapsed().as_millis();
                let in_flight = self.locks.in_flight().await;
                health_status.checks.insert(
                    "order_store".to_string(),
                    ComponentHealth::up(Some(response_time)).with_details(format!(
                        "{} orders, {} in flight",
                        count, in_flight
                    )),
                );
                info!("Order store health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "order_store".to_string(),
                    ComponentHealth::down(Some(e.to_string())),
                );
                error!("Order store health check failed: {}", e);
            }
            Err(_) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "order_store".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Order store health check timed out");
            }
        }

        // Fulfillment queue; payments still settle without it
        if self.fulfillment.is_accepting() {
            health_status
                .checks
                .insert("fulfillment_queue".to_string(), ComponentHealth::up(None));
        } else {
            degraded = true;
            health_status.checks.insert(
                "fulfillment_queue".to_string(),
                ComponentHealth::warning(None, Some("Queue closed".to_string())),
            );
            error!("Fulfillment queue is not accepting jobs");
        }

        health_status.status = if !overall_healthy {
            HealthState::Unhealthy
        } else if degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        health_status
    }

    /// Readiness: the order store answers
    pub async fn check_ready(&self) -> bool {
        matches!(
            timeout(Duration::from_secs(2), self.orders.count()).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::error::DatabaseError;
    use crate::database::order_repository::{InMemoryOrderRepository, Order};
    use crate::services::fulfillment::QueueFulfillmentTrigger;
    use crate::services::order_state::OrderStatus;

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl OrderRepository for UnavailableStore {
        async fn insert(&self, _order: Order) -> Result<Order, DatabaseError> {
            Err(unavailable())
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Order>, DatabaseError> {
            Err(unavailable())
        }

        async fn list(&self) -> Result<Vec<Order>, DatabaseError> {
            Err(unavailable())
        }

        async fn count(&self) -> Result<usize, DatabaseError> {
            Err(unavailable())
        }

        async fn update_if_status(
            &self,
            _expected: OrderStatus,
            _order: Order,
        ) -> Result<Order, DatabaseError> {
            Err(unavailable())
        }
    }

    fn unavailable() -> DatabaseError {
        DatabaseError::Unavailable {
            message: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn unhealthy_when_order_store_fails() {
        let (trigger, _receiver) = QueueFulfillmentTrigger::channel(4);
        let checker = HealthChecker::new(
            Arc::new(UnavailableStore),
            Arc::new(trigger),
            Arc::new(OrderLocks::new()),
        );

        let status = checker.check_health().await;
        assert_eq!(status.status, HealthState::Unhealthy);
        assert!(!status.is_healthy());
        let store = &status.checks["order_store"];
        assert_eq!(store.status, ComponentState::Down);
        assert!(store.details.as_deref().unwrap().contains("connection reset"));
        assert!(!checker.check_ready().await);
    }

    #[tokio::test]
    async fn healthy_when_store_and_queue_are_up() {
        let (trigger, _receiver) = QueueFulfillmentTrigger::channel(4);
        let checker = HealthChecker::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(trigger),
            Arc::new(OrderLocks::new()),
        );

        let status = checker.check_health().await;
        assert_eq!(status.status, HealthState::Healthy);
        assert!(status.checks.contains_key("order_store"));
        assert!(checker.check_ready().await);
    }

    #[tokio::test]
    async fn degraded_when_fulfillment_queue_is_closed() {
        let (trigger, receiver) = QueueFulfillmentTrigger::channel(4);
        drop(receiver);
        let checker = HealthChecker::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(trigger),
            Arc::new(OrderLocks::new()),
        );

        let status = checker.check_health().await;
        assert_eq!(status.status, HealthState::Degraded);
        assert!(status.is_healthy());
        assert_eq!(
            status.checks["fulfillment_queue"].status,
            ComponentState::Warning
        );
    }
}
