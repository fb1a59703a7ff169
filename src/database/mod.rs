//! Order and transaction storage
//!
//! Repositories are traits so the flows can be handed any store; the
//! in-memory implementations back the service and the tests.

pub mod error;
pub mod order_repository;
pub mod transaction_repository;

pub use error::DatabaseError;
pub use order_repository::{
    CustomerInfo, InMemoryOrderRepository, LineItem, Order, OrderRepository,
};
pub use transaction_repository::{
    InMemoryTransactionRepository, Transaction, TransactionRepository, TransactionStatus,
};
