use std::sync::Arc;

use uuid::Uuid;

use resonate_core::{
    EngineError, Order, OrderStatus, OrderStatusChange, OrderStore, ProcurementStatus,
};

/// Applies externally-driven order transitions (acceptance, completion,
/// payment, cancellation) and procurement updates. Transitions are accepted
/// as given but must follow the lifecycle graph forward; the engine never
/// moves an order backward.
pub struct OrderManager {
    store: Arc<dyn OrderStore>,
}

impl OrderManager {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn apply_status(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        changed_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Order, EngineError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))?;

        if !OrderStatus::can_transition(order.status, to) {
            return Err(EngineError::conflict(format!(
                "order {} cannot move from {} to {}",
                order_id,
                order.status.as_str(),
                to.as_str()
            )));
        }

        let change = OrderStatusChange::new(order_id, Some(order.status), to, changed_by, notes);
        self.store
            .update_order_status(order_id, order.status, &change)
            .await?;

        tracing::info!(
            "Order {} moved {} -> {}",
            order_id,
            order.status.as_str(),
            to.as_str()
        );

        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))
    }

    /// Procurement paperwork moves independently of fulfillment status
    pub async fn update_procurement(
        &self,
        order_id: Uuid,
        status: ProcurementStatus,
        purchase_order_number: Option<&str>,
    ) -> Result<Order, EngineError> {
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))?;

        self.store
            .update_procurement(order_id, status, purchase_order_number)
            .await?;

        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{OrderFactory, OrderRequest};
    use crate::pricing::{LineItemRequest, PricingEngine};
    use chrono::Utc;
    use resonate_core::{Campaign, CampaignStatus, Publisher, SourceCategory};
    use resonate_store::memory::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let campaign_id = Uuid::new_v4();
        let publisher_id = Uuid::new_v4();
        store.seed_campaign(Campaign {
            id: campaign_id,
            advertiser_id: Uuid::new_v4(),
            title: "Census Outreach".to_string(),
            budget_min_cents: 0,
            budget_max_cents: 500000,
            starts_at: None,
            ends_at: None,
            targeting: serde_json::json!({}),
            source_category: SourceCategory::Nonprofit,
            status: CampaignStatus::Active,
            created_at: Utc::now(),
        });
        store.seed_publisher(Publisher {
            id: publisher_id,
            name: "48 Hills".to_string(),
            created_at: Utc::now(),
        });

        let factory = OrderFactory::new(store.clone(), PricingEngine::new(0.15));
        let created = factory
            .create_order(OrderRequest {
                campaign_id,
                publisher_id,
                match_id: None,
                line_items: vec![LineItemRequest {
                    deliverable_type: "ARTICLE".to_string(),
                    platform: "BLOG".to_string(),
                    quantity: 1,
                    unit_price_cents: 25000,
                    description: None,
                }],
                delivery_deadline: None,
                notes: None,
            })
            .await
            .unwrap();
        (store, created.order.id)
    }

    #[tokio::test]
    async fn test_forward_transition_with_history() {
        let (store, order_id) = setup().await;
        let manager = OrderManager::new(store.clone() as Arc<dyn OrderStore>);

        let order = manager
            .apply_status(order_id, OrderStatus::Accepted, Some("PUBLISHER"), None)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);

        let history = store.status_history(order_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].from_status, Some(OrderStatus::PendingPublisher));
        assert_eq!(history[1].to_status, OrderStatus::Accepted);
        assert_eq!(history[1].changed_by.as_deref(), Some("PUBLISHER"));
    }

    #[tokio::test]
    async fn test_backward_and_skipping_transitions_rejected() {
        let (store, order_id) = setup().await;
        let manager = OrderManager::new(store.clone() as Arc<dyn OrderStore>);

        // Cannot skip ahead
        let result = manager
            .apply_status(order_id, OrderStatus::Delivered, None, None)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));

        manager
            .apply_status(order_id, OrderStatus::Accepted, None, None)
            .await
            .unwrap();

        // Cannot move backward
        let result = manager
            .apply_status(order_id, OrderStatus::PendingPublisher, None, None)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cancel_before_completed() {
        let (store, order_id) = setup().await;
        let manager = OrderManager::new(store.clone() as Arc<dyn OrderStore>);

        let order = manager
            .apply_status(order_id, OrderStatus::Cancelled, Some("ADVERTISER"), Some("Budget pulled"))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        // Absorbing: nothing moves out of CANCELLED
        let result = manager
            .apply_status(order_id, OrderStatus::Accepted, None, None)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_unknown_order_rejected() {
        let (store, _) = setup().await;
        let manager = OrderManager::new(store.clone() as Arc<dyn OrderStore>);

        let result = manager
            .apply_status(Uuid::new_v4(), OrderStatus::Accepted, None, None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_procurement_updates_independently() {
        let (store, order_id) = setup().await;
        let manager = OrderManager::new(store.clone() as Arc<dyn OrderStore>);

        let order = manager
            .update_procurement(order_id, ProcurementStatus::Submitted, Some("PO-2026-0144"))
            .await
            .unwrap();
        assert_eq!(order.procurement_status, ProcurementStatus::Submitted);
        assert_eq!(order.purchase_order_number.as_deref(), Some("PO-2026-0144"));
        // Fulfillment status untouched
        assert_eq!(order.status, OrderStatus::PendingPublisher);
    }
}
