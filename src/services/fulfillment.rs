//! Fulfillment hand-off
//!
//! Fired after an order reaches `paid` or `authorized`. Dispatch never blocks
//! the request path and never fails the transition that fired it.

use crate::database::order_repository::Order;
use crate::services::order_state::{CheckoutMethod, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("fulfillment queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("fulfillment queue is closed")]
    QueueClosed,
}

/// Work item for the delivery side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentJob {
    pub order_id: String,
    pub method: CheckoutMethod,
    pub status: OrderStatus,
    pub customer_name: String,
    pub delivery_address: Option<String>,
    pub total_amount: Decimal,
    pub triggered_at: DateTime<Utc>,
}

impl FulfillmentJob {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            method: order.method,
            status: order.status,
            customer_name: order.customer_info.name.clone(),
            delivery_address: order.customer_info.address.clone(),
            total_amount: order.total_amount,
            triggered_at: Utc::now(),
        }
    }
}

pub trait FulfillmentTrigger: Send + Sync {
    /// Hand the order to fulfillment. Must return immediately.
    fn trigger(&self, order: &Order);

    /// Whether jobs can still be accepted
    fn is_accepting(&self) -> bool {
        true
    }
}

/// Enqueues jobs onto a bounded channel drained by `FulfillmentWorker`
#[derive(Clone)]
pub struct QueueFulfillmentTrigger {
    sender: mpsc::Sender<FulfillmentJob>,
}

impl QueueFulfillmentTrigger {
    /// Build the trigger and the receiving end for the worker
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FulfillmentJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn dispatch(&self, job: FulfillmentJob) -> Result<(), FulfillmentError> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => FulfillmentError::QueueFull {
                capacity: self.sender.max_capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => FulfillmentError::QueueClosed,
        })
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

impl FulfillmentTrigger for QueueFulfillmentTrigger {
    fn trigger(&self, order: &Order) {
        match self.dispatch(FulfillmentJob::from_order(order)) {
            Ok(()) => info!(
                order_id = %order.id,
                status = %order.status,
                "Order queued for fulfillment"
            ),
            Err(e @ FulfillmentError::QueueFull { .. }) => warn!(
                order_id = %order.id,
                error = %e,
                "Fulfillment dispatch dropped"
            ),
            Err(e) => error!(
                order_id = %order.id,
                error = %e,
                "Fulfillment dispatch failed"
            ),
        }
    }

    fn is_accepting(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::order_repository::{CustomerInfo, LineItem};
    use rust_decimal_macros::dec;

    fn paid_order(id: &str) -> Order {
        let mut order = Order::new(
            id.to_string(),
            vec![LineItem {
                id: "1".to_string(),
                name: "Fresh Tomatoes".to_string(),
                price: dec!(25),
                quantity: 2,
            }],
            CustomerInfo {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                address: Some("12 Marina, Lagos".to_string()),
            },
            CheckoutMethod::Standard,
            dec!(50),
            Utc::now(),
        );
        order.mark_paid(Utc::now()).unwrap();
        order
    }

    #[tokio::test]
    async fn trigger_enqueues_job() {
        let (trigger, mut receiver) = QueueFulfillmentTrigger::channel(4);
        trigger.trigger(&paid_order("o1"));

        assert_eq!(trigger.queued(), 1);
        let job = receiver.recv().await.unwrap();
        assert_eq!(job.order_id, "o1");
        assert_eq!(job.status, OrderStatus::Paid);
        assert_eq!(job.total_amount, dec!(50));
        assert_eq!(job.delivery_address.as_deref(), Some("12 Marina, Lagos"));
    }

    #[tokio::test]
    async fn full_queue_is_reported_not_blocking() {
        let (trigger, _receiver) = QueueFulfillmentTrigger::channel(1);
        trigger
            .dispatch(FulfillmentJob::from_order(&paid_order("o1")))
            .unwrap();

        let err = trigger
            .dispatch(FulfillmentJob::from_order(&paid_order("o2")))
            .unwrap_err();
        assert_eq!(err, FulfillmentError::QueueFull { capacity: 1 });

        // The trait method swallows the failure.
        trigger.trigger(&paid_order("o3"));
    }

    #[tokio::test]
    async fn closed_queue_stops_accepting() {
        let (trigger, receiver) = QueueFulfillmentTrigger::channel(1);
        drop(receiver);

        assert!(!trigger.is_accepting());
        assert_eq!(
            trigger.dispatch(FulfillmentJob::from_order(&paid_order("o1"))),
            Err(FulfillmentError::QueueClosed)
        );
    }
}
