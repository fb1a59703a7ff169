use crate::database::error::DatabaseError;
use crate::services::order_state::{CheckoutMethod, OrderStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One cart line as submitted by the storefront
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl LineItem {
    /// `None` when the line overflows the decimal range
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Storefront product ids arrive as numbers, recovered ones as strings
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(value) => value,
        Id::Number(value) => value.to_string(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub cart: Vec<LineItem>,
    pub customer_info: CustomerInfo,
    pub method: CheckoutMethod,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// Reusable card token; serialized masked to its last four characters
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "masked_authorization_code"
    )]
    pub authorization_code: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending order.
    ///
    /// `total_amount` comes from `cart_total` and is never recomputed.
    pub fn new(
        id: String,
        cart: Vec<LineItem>,
        customer_info: CustomerInfo,
        method: CheckoutMethod,
        total_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            cart,
            customer_info,
            method,
            total_amount,
            status: OrderStatus::Pending,
            authorization_code: None,
            created_at,
            paid_at: None,
            authorized_at: None,
            charged_at: None,
            completed_at: None,
        }
    }
}

/// `AUTH_pod123` serializes as `****d123`
fn masked_authorization_code<S>(code: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match code {
        Some(code) => serializer.serialize_str(&mask_authorization_code(code)),
        None => serializer.serialize_none(),
    }
}

pub fn mask_authorization_code(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Sum of line subtotals, or `None` on overflow
pub fn cart_total(cart: &[LineItem]) -> Option<Decimal> {
    cart.iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal()?))
}

/// Order storage.
///
/// `update_if_status` is the only way to persist a transition: the write
/// succeeds only if the stored order still has `expected` status.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: Order) -> Result<Order, DatabaseError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, DatabaseError>;

    /// All orders, newest first
    async fn list(&self) -> Result<Vec<Order>, DatabaseError>;

    async fn count(&self) -> Result<usize, DatabaseError>;

    async fn update_if_status(
        &self,
        expected: OrderStatus,
        order: Order,
    ) -> Result<Order, DatabaseError>;
}

/// Process-local order store
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: Order) -> Result<Order, DatabaseError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(DatabaseError::Duplicate { id: order.id });
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>, DatabaseError> {
        let mut orders: Vec<Order> = self.orders.read().await.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn count(&self) -> Result<usize, DatabaseError> {
        Ok(self.orders.read().await.len())
    }

    async fn update_if_status(
        &self,
        expected: OrderStatus,
        order: Order,
    ) -> Result<Order, DatabaseError> {
        let mut orders = self.orders.write().await;
        let stored = orders
            .get_mut(&order.id)
            .ok_or_else(|| DatabaseError::NotFound {
                id: order.id.clone(),
            })?;

        if stored.status != expected {
            return Err(DatabaseError::StatusConflict {
                id: order.id,
                expected: expected.to_string(),
                actual: stored.status.to_string(),
            });
        }

        *stored = order.clone();
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample_cart() -> Vec<LineItem> {
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
        ]
    }

    fn sample_order(id: &str, created_at: DateTime<Utc>) -> Order {
        Order::new(
            id.to_string(),
            sample_cart(),
            CustomerInfo {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: Some("08012345678".to_string()),
                address: None,
            },
            CheckoutMethod::Standard,
            dec!(170),
            created_at,
        )
    }

    #[test]
    fn total_is_sum_of_line_subtotals() {
        assert_eq!(cart_total(&sample_cart()), Some(dec!(170)));
        assert_eq!(cart_total(&[]), Some(Decimal::ZERO));
    }

    #[test]
    fn oversized_cart_total_is_none_instead_of_panicking() {
        let huge = LineItem {
            id: "1".to_string(),
            name: "Bulk".to_string(),
            price: Decimal::MAX,
            quantity: 4_000_000_000,
        };
        assert_eq!(huge.subtotal(), None);
        assert_eq!(cart_total(&[huge]), None);

        let near_max = LineItem {
            id: "2".to_string(),
            name: "Bulk".to_string(),
            price: Decimal::MAX,
            quantity: 1,
        };
        assert_eq!(cart_total(&[near_max.clone(), near_max]), None);
    }

    #[test]
    fn line_item_accepts_numeric_ids_and_ignores_extra_fields() {
        let item: LineItem = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Fresh Tomatoes",
            "price": 25,
            "quantity": 2,
            "category": "vegetables"
        }))
        .unwrap();
        assert_eq!(item.id, "7");
        assert_eq!(item.subtotal(), Some(dec!(50)));
    }

    #[test]
    fn order_serializes_camel_case_with_masked_card_token() {
        let mut order = sample_order("o1", Utc::now());
        order.authorization_code = Some("AUTH_secret".to_string());

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["customerInfo"]["email"], "ada@example.com");
        assert_eq!(json["totalAmount"], serde_json::json!(170.0));
        assert_eq!(json["status"], "pending");
        assert_eq!(json["method"], "standard");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("paidAt").is_none());
        assert_eq!(json["authorizationCode"], "****cret");
        assert!(!json.to_string().contains("AUTH_secret"));

        order.authorization_code = None;
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("authorizationCode").is_none());
    }

    #[test]
    fn short_card_tokens_are_fully_masked() {
        assert_eq!(mask_authorization_code("AUTH_pod123"), "****d123");
        assert_eq!(mask_authorization_code("abcd"), "****");
        assert_eq!(mask_authorization_code(""), "****");
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let repo = InMemoryOrderRepository::new();
        repo.insert(sample_order("o1", Utc::now())).await.unwrap();

        let err = repo
            .insert(sample_order("o1", Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(err, DatabaseError::Duplicate { id: "o1".to_string() });
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let repo = InMemoryOrderRepository::new();
        let now = Utc::now();
        repo.insert(sample_order("older", now - Duration::minutes(5)))
            .await
            .unwrap();
        repo.insert(sample_order("newest", now)).await.unwrap();
        repo.insert(sample_order("oldest", now - Duration::hours(1)))
            .await
            .unwrap();

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["newest", "older", "oldest"]);
    }

    #[tokio::test]
    async fn update_if_status_is_a_compare_and_swap() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.insert(sample_order("o1", Utc::now())).await.unwrap();

        let mut paid = order.clone();
        paid.mark_paid(Utc::now()).unwrap();
        repo.update_if_status(OrderStatus::Pending, paid.clone())
            .await
            .unwrap();

        // A second writer still holding the pending snapshot loses.
        let mut stale = order;
        stale.mark_paid(Utc::now()).unwrap();
        let err = repo
            .update_if_status(OrderStatus::Pending, stale)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::StatusConflict { .. }));

        let stored = repo.find_by_id("o1").await.unwrap().unwrap();
        assert_eq!(stored.paid_at, paid.paid_at);
    }

    #[tokio::test]
    async fn update_of_unknown_order_is_not_found() {
        let repo = InMemoryOrderRepository::new();
        let err = repo
            .update_if_status(OrderStatus::Pending, sample_order("ghost", Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
