use crate::database::error::DatabaseError;
use crate::services::order_state::CheckoutMethod;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Initialized,
    Success,
}

/// Gateway bookkeeping for an order, keyed by the order id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub reference: String,
    #[serde(rename = "authorization_url")]
    pub authorization_url: Option<String>,
    pub method: CheckoutMethod,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn initialized(reference: String, authorization_url: String, method: CheckoutMethod) -> Self {
        Self {
            reference,
            authorization_url: Some(authorization_url),
            method,
            status: TransactionStatus::Initialized,
            created_at: Utc::now(),
            verified_at: None,
        }
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn save(&self, transaction: Transaction) -> Result<Transaction, DatabaseError>;

    async fn find_by_reference(&self, reference: &str)
        -> Result<Option<Transaction>, DatabaseError>;

    /// Mark the transaction verified, creating it when the checkout record was lost.
    /// `verified_at` keeps its first value.
    async fn mark_verified(
        &self,
        reference: &str,
        method: CheckoutMethod,
        at: DateTime<Utc>,
    ) -> Result<Transaction, DatabaseError>;
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn save(&self, transaction: Transaction) -> Result<Transaction, DatabaseError> {
        self.transactions
            .write()
            .await
            .insert(transaction.reference.clone(), transaction.clone());
        Ok(transaction)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        Ok(self.transactions.read().await.get(reference).cloned())
    }

    async fn mark_verified(
        &self,
        reference: &str,
        method: CheckoutMethod,
        at: DateTime<Utc>,
    ) -> Result<Transaction, DatabaseError> {
        let mut transactions = self.transactions.write().await;
        let entry = transactions
            .entry(reference.to_string())
            .or_insert_with(|| Transaction {
                reference: reference.to_string(),
                authorization_url: None,
                method,
                status: TransactionStatus::Initialized,
                created_at: at,
                verified_at: None,
            });

        entry.status = TransactionStatus::Success;
        entry.verified_at.get_or_insert(at);
        Ok(entry.clone())
    }
}
