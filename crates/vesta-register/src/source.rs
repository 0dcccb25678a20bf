//! # Order Source Boundary
//!
//! The refund processor never owns order storage; it looks completed orders
//! up through the [`OrderSource`] trait. Production wires this to whatever
//! persistence the terminal runs; tests and local tooling use the in-memory
//! implementation shipped here.
//!
//! The contract is read-only by design: the refund flow must not be able to
//! mutate an order, only fetch an immutable copy of it.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use vesta_core::types::Order;

// =============================================================================
// Order Source Trait
// =============================================================================

/// Read-only access to completed orders.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Fetches one completed order by its business id, if it exists.
    async fn order_by_id(&self, order_id: &str) -> Option<Order>;
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// In-memory order source for tests and local tooling.
#[derive(Default)]
pub struct MemoryOrderSource {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a completed order, replacing any previous order with the same id.
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }

    /// Number of orders currently held.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// True when no orders are held.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderSource for MemoryOrderSource {
    async fn order_by_id(&self, order_id: &str) -> Option<Order> {
        self.orders.read().await.get(order_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vesta_core::types::{LineItem, PaymentMethod};

    fn sample_order(id: &str) -> Order {
        Order::new(
            id,
            "BR-1",
            "CASH-9",
            None,
            vec![LineItem {
                product_id: "P-1".into(),
                name: "Mineral water 1L".into(),
                unit_price_cents: 150,
                quantity: 2,
            }],
            300,
            PaymentMethod::Cash,
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let source = MemoryOrderSource::new();
        assert!(source.is_empty().await);

        source.insert(sample_order("ORD-001")).await;
        assert_eq!(source.len().await, 1);

        let fetched = source.order_by_id("ORD-001").await;
        assert_eq!(fetched.map(|o| o.id), Some("ORD-001".to_string()));
    }

    #[tokio::test]
    async fn test_missing_order_is_none() {
        let source = MemoryOrderSource::new();
        assert!(source.order_by_id("ORD-404").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_same_id() {
        let source = MemoryOrderSource::new();
        source.insert(sample_order("ORD-001")).await;
        source.insert(sample_order("ORD-001")).await;
        assert_eq!(source.len().await, 1);
    }
}
