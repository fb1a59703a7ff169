//! Order lifecycle state machine
//!
//! ```text
//! standard:         pending -> paid       -> completed
//! pay-on-delivery:  pending -> authorized -> completed
//! ```
//!
//! Status only ever moves forward and every transition timestamp is written
//! exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::order_repository::Order;

/// How the customer pays for an order
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CheckoutMethod {
    /// Pay now: the card is charged at checkout
    #[default]
    #[serde(rename = "standard")]
    Standard,
    /// Pay on delivery: the card is authorized at checkout and captured on delivery
    #[serde(rename = "POD", alias = "pay-on-delivery", alias = "pay_on_delivery", alias = "pod")]
    PayOnDelivery,
}

impl CheckoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMethod::Standard => "standard",
            CheckoutMethod::PayOnDelivery => "POD",
        }
    }

    /// The status an order of this method reaches once payment is secured
    pub fn settled_status(&self) -> OrderStatus {
        match self {
            CheckoutMethod::Standard => OrderStatus::Paid,
            CheckoutMethod::PayOnDelivery => OrderStatus::Authorized,
        }
    }
}

impl std::fmt::Display for CheckoutMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order stored, payment not yet confirmed
    Pending,
    /// Standard order charged
    Paid,
    /// Pay-on-delivery order holding a card authorization
    Authorized,
    /// Delivered and settled
    Completed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Authorized => write!(f, "authorized"),
            OrderStatus::Completed => write!(f, "completed"),
        }
    }
}

impl OrderStatus {
    /// Position along the lifecycle; `paid` and `authorized` share a rank
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Paid | OrderStatus::Authorized => 1,
            OrderStatus::Completed => 2,
        }
    }

    /// Get all valid transitions from this state for the given method
    pub fn valid_transitions(&self, method: CheckoutMethod) -> Vec<OrderStatus> {
        match (method, self) {
            (CheckoutMethod::Standard, OrderStatus::Pending) => vec![OrderStatus::Paid],
            (CheckoutMethod::PayOnDelivery, OrderStatus::Pending) => {
                vec![OrderStatus::Authorized]
            }
            (CheckoutMethod::Standard, OrderStatus::Paid) => vec![OrderStatus::Completed],
            (CheckoutMethod::PayOnDelivery, OrderStatus::Authorized) => {
                vec![OrderStatus::Completed]
            }
            _ => vec![],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus, method: CheckoutMethod) -> bool {
        self.valid_transitions(method).contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{method} orders cannot move from {from} to {to}")]
    NotAllowed {
        order_id: String,
        method: CheckoutMethod,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("authorization code is required")]
    MissingAuthorizationCode { order_id: String },
}

impl TransitionError {
    pub fn order_id(&self) -> &str {
        match self {
            TransitionError::NotAllowed { order_id, .. } => order_id,
            TransitionError::MissingAuthorizationCode { order_id } => order_id,
        }
    }

    /// Verb describing the attempted action, for error messages
    pub fn action(&self) -> &'static str {
        match self {
            TransitionError::NotAllowed { to, .. } => match to {
                OrderStatus::Pending => "reset",
                OrderStatus::Paid => "mark as paid",
                OrderStatus::Authorized => "authorize",
                OrderStatus::Completed => "complete",
            },
            TransitionError::MissingAuthorizationCode { .. } => "authorize",
        }
    }
}

impl Order {
    fn ensure_transition(&self, to: OrderStatus) -> Result<(), TransitionError> {
        if self.status.can_transition_to(to, self.method) {
            Ok(())
        } else {
            Err(TransitionError::NotAllowed {
                order_id: self.id.clone(),
                method: self.method,
                from: self.status,
                to,
            })
        }
    }

    /// `pending -> paid` (standard only)
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_transition(OrderStatus::Paid)?;
        self.status = OrderStatus::Paid;
        self.paid_at = Some(at);
        Ok(())
    }

    /// `pending -> authorized` (pay-on-delivery only)
    pub fn mark_authorized(
        &mut self,
        authorization_code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if authorization_code.trim().is_empty() {
            return Err(TransitionError::MissingAuthorizationCode {
                order_id: self.id.clone(),
            });
        }
        self.ensure_transition(OrderStatus::Authorized)?;
        self.status = OrderStatus::Authorized;
        self.authorization_code = Some(authorization_code.trim().to_string());
        self.authorized_at = Some(at);
        Ok(())
    }

    /// `paid -> completed` for standard orders; `authorized -> completed` for
    /// pay-on-delivery orders after the stored authorization was captured.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_transition(OrderStatus::Completed)?;
        if self.method == CheckoutMethod::PayOnDelivery {
            self.charged_at = Some(at);
        }
        self.status = OrderStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Payment already secured (or the order is finished)
    pub fn is_settled(&self) -> bool {
        self.status.rank() >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::order_repository::{CustomerInfo, LineItem};
    use rust_decimal_macros::dec;

    fn order(method: CheckoutMethod) -> Order {
        Order::new(
            "order_1".to_string(),
            vec![
                LineItem {
                    id: "1".to_string(),
                    name: "Fresh Tomatoes".to_string(),
                    price: dec!(25),
                    quantity: 2,
                },
                LineItem {
                    id: "2".to_string(),
                    name: "Rice (5kg)".to_string(),
                    price: dec!(120),
                    quantity: 1,
                },
            ],
            CustomerInfo {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                address: None,
            },
            method,
            dec!(170),
            Utc::now(),
        )
    }

    #[test]
    fn standard_lifecycle() {
        let mut order = order(CheckoutMethod::Standard);
        assert_eq!(order.status, OrderStatus::Pending);

        order.mark_paid(Utc::now()).expect("pending -> paid");
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid_at.is_some());

        order.mark_completed(Utc::now()).expect("paid -> completed");
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.completed_at.is_some());
        assert!(order.charged_at.is_none());
    }

    #[test]
    fn pay_on_delivery_lifecycle() {
        let mut order = order(CheckoutMethod::PayOnDelivery);

        order
            .mark_authorized("AUTH_abc", Utc::now())
            .expect("pending -> authorized");
        assert_eq!(order.authorization_code.as_deref(), Some("AUTH_abc"));
        assert!(order.authorized_at.is_some());

        order.mark_completed(Utc::now()).expect("authorized -> completed");
        assert!(order.charged_at.is_some());
        assert!(order.completed_at.is_some());
    }

    #[test]
    fn method_restricts_intermediate_status() {
        let mut standard = order(CheckoutMethod::Standard);
        assert!(standard.mark_authorized("AUTH_abc", Utc::now()).is_err());

        let mut pod = order(CheckoutMethod::PayOnDelivery);
        let err = pod.mark_paid(Utc::now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAllowed {
                order_id: "order_1".to_string(),
                method: CheckoutMethod::PayOnDelivery,
                from: OrderStatus::Pending,
                to: OrderStatus::Paid,
            }
        );
        assert_eq!(pod.status, OrderStatus::Pending);
    }

    #[test]
    fn pending_orders_cannot_complete() {
        for method in [CheckoutMethod::Standard, CheckoutMethod::PayOnDelivery] {
            let mut order = order(method);
            assert!(order.mark_completed(Utc::now()).is_err());
            assert_eq!(order.status, OrderStatus::Pending);
            assert!(order.completed_at.is_none());
        }
    }

    #[test]
    fn transitions_never_move_backwards() {
        let statuses = [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Authorized,
            OrderStatus::Completed,
        ];
        for method in [CheckoutMethod::Standard, CheckoutMethod::PayOnDelivery] {
            for from in statuses {
                for to in from.valid_transitions(method) {
                    assert!(to.rank() > from.rank(), "{} -> {} for {}", from, to, method);
                }
            }
        }
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Completed
            .valid_transitions(CheckoutMethod::Standard)
            .is_empty());
    }

    #[test]
    fn paid_timestamp_is_written_once() {
        let mut order = order(CheckoutMethod::Standard);
        let first = Utc::now();
        order.mark_paid(first).expect("pending -> paid");
        assert!(order.mark_paid(Utc::now()).is_err());
        assert_eq!(order.paid_at, Some(first));
    }

    #[test]
    fn blank_authorization_code_is_rejected() {
        let mut order = order(CheckoutMethod::PayOnDelivery);
        assert!(matches!(
            order.mark_authorized("  ", Utc::now()),
            Err(TransitionError::MissingAuthorizationCode { .. })
        ));
    }

    #[test]
    fn method_wire_names() {
        let pod: CheckoutMethod = serde_json::from_str("\"POD\"").unwrap();
        assert_eq!(pod, CheckoutMethod::PayOnDelivery);
        let pod: CheckoutMethod = serde_json::from_str("\"pay-on-delivery\"").unwrap();
        assert_eq!(pod, CheckoutMethod::PayOnDelivery);
        assert_eq!(
            serde_json::to_value(CheckoutMethod::Standard).unwrap(),
            serde_json::json!("standard")
        );
        assert_eq!(CheckoutMethod::PayOnDelivery.settled_status(), OrderStatus::Authorized);
    }
}
