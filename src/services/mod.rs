//! Services module for the checkout and payment flows

pub mod checkout;
pub mod delivery;
pub mod fulfillment;
pub mod locks;
pub mod order_state;
pub mod reconciliation;
pub mod webhook_processor;

pub use checkout::{CheckoutRequest, CheckoutService, CheckoutSession};
pub use delivery::DeliveryService;
pub use fulfillment::{FulfillmentTrigger, QueueFulfillmentTrigger};
pub use locks::OrderLocks;
pub use order_state::{CheckoutMethod, OrderStatus, TransitionError};
pub use reconciliation::{PaymentReconciler, VerificationOutcome};
pub use webhook_processor::{WebhookDisposition, WebhookProcessor, WebhookProcessorError};
