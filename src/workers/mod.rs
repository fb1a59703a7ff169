pub mod fulfillment_worker;

pub use fulfillment_worker::{join_with_timeout, FulfillmentWorker};
