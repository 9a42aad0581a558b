use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use resonate_core::{
    Deliverable, DeliverableStatus, EngineError, NewOrderBundle, Order, OrderLineItem,
    OrderStatus, OrderStatusChange, OrderStore, ProcurementStatus,
};

use crate::pricing::{LineItemRequest, PricingEngine};

/// Request to materialize an order for a matched advertiser/publisher pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub campaign_id: Uuid,
    pub publisher_id: Uuid,
    pub match_id: Option<Uuid>,
    pub line_items: Vec<LineItemRequest>,
    pub delivery_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// The order aggregate as persisted by the factory
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub line_items: Vec<OrderLineItem>,
    pub deliverables: Vec<Deliverable>,
}

/// Validates an order request, prices it, and persists the order together
/// with its line items and one pending deliverable per unit of quantity.
pub struct OrderFactory {
    store: Arc<dyn OrderStore>,
    pricing: PricingEngine,
}

impl OrderFactory {
    pub fn new(store: Arc<dyn OrderStore>, pricing: PricingEngine) -> Self {
        Self { store, pricing }
    }

    pub async fn create_order(&self, req: OrderRequest) -> Result<CreatedOrder, EngineError> {
        // 1. Validate shape before touching the store
        if req.line_items.is_empty() {
            return Err(EngineError::invalid_input(
                "order requires at least one line item",
            ));
        }
        for (idx, item) in req.line_items.iter().enumerate() {
            if item.deliverable_type.trim().is_empty() {
                return Err(EngineError::invalid_input(format!(
                    "line item {} is missing a deliverable type",
                    idx
                )));
            }
            if item.platform.trim().is_empty() {
                return Err(EngineError::invalid_input(format!(
                    "line item {} is missing a platform",
                    idx
                )));
            }
        }

        // 2. References must resolve
        self.store
            .campaign(req.campaign_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("campaign {}", req.campaign_id)))?;
        self.store
            .publisher(req.publisher_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("publisher {}", req.publisher_id)))?;

        if let Some(match_id) = req.match_id {
            let m = self
                .store
                .campaign_match(match_id)
                .await?
                .ok_or_else(|| EngineError::not_found(format!("campaign match {}", match_id)))?;
            if m.is_selected {
                return Err(EngineError::conflict(format!(
                    "campaign match {} is already selected",
                    match_id
                )));
            }
            if m.campaign_id != req.campaign_id || m.publisher_id != req.publisher_id {
                return Err(EngineError::invalid_input(format!(
                    "campaign match {} does not pair campaign {} with publisher {}",
                    match_id, req.campaign_id, req.publisher_id
                )));
            }
        }

        // 3. Price the request
        let quote = self.pricing.price(&req.line_items)?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let order = Order {
            id: order_id,
            campaign_id: req.campaign_id,
            publisher_id: req.publisher_id,
            match_id: req.match_id,
            status: OrderStatus::PendingPublisher,
            procurement_status: ProcurementStatus::NotSubmitted,
            purchase_order_number: None,
            subtotal_cents: quote.subtotal_cents,
            platform_fee_cents: quote.platform_fee_cents,
            total_cents: quote.total_cents,
            delivery_deadline: req.delivery_deadline,
            notes: req.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        // 4. One line item per request row, one deliverable per unit of quantity.
        // Creation stamps are staggered per unit so the earliest-created FIFO
        // claim stays deterministic within a batch.
        let mut line_items = Vec::with_capacity(req.line_items.len());
        let mut deliverables = Vec::new();
        let mut unit_seq: i64 = 0;
        for (item, total) in req.line_items.iter().zip(quote.line_totals.iter()) {
            let line_item = OrderLineItem {
                id: Uuid::new_v4(),
                order_id,
                deliverable_type: item.deliverable_type.clone(),
                platform: item.platform.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                total_price_cents: *total,
                description: item.description.clone(),
                created_at: now,
            };

            for _ in 0..item.quantity {
                deliverables.push(Deliverable {
                    id: Uuid::new_v4(),
                    order_id,
                    line_item_id: line_item.id,
                    platform: line_item.platform.clone(),
                    deliverable_type: line_item.deliverable_type.clone(),
                    status: DeliverableStatus::Pending,
                    submission_url: None,
                    screenshot_url: None,
                    submission_notes: None,
                    metrics: serde_json::json!({}),
                    submitted_at: None,
                    approved_at: None,
                    created_at: now + Duration::microseconds(unit_seq),
                });
                unit_seq += 1;
            }

            line_items.push(line_item);
        }

        let change = OrderStatusChange::new(
            order_id,
            None,
            OrderStatus::PendingPublisher,
            Some("SYSTEM"),
            Some("Order created"),
        );

        // 5. Commit order, line items, deliverables, match selection as a unit
        let bundle = NewOrderBundle {
            order: order.clone(),
            line_items: line_items.clone(),
            deliverables: deliverables.clone(),
            select_match: req.match_id,
            change,
        };
        self.store.create_order(&bundle).await?;

        tracing::info!(
            "Created order {} for campaign {} ({} deliverables, total {} cents)",
            order_id,
            req.campaign_id,
            deliverables.len(),
            order.total_cents
        );

        Ok(CreatedOrder {
            order,
            line_items,
            deliverables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonate_core::{Campaign, CampaignMatch, CampaignStatus, Publisher, SourceCategory};
    use resonate_store::memory::MemoryStore;

    fn seed_pair(store: &MemoryStore) -> (Uuid, Uuid) {
        let campaign_id = Uuid::new_v4();
        let publisher_id = Uuid::new_v4();
        store.seed_campaign(Campaign {
            id: campaign_id,
            advertiser_id: Uuid::new_v4(),
            title: "Flu Shot Awareness".to_string(),
            budget_min_cents: 50000,
            budget_max_cents: 200000,
            starts_at: None,
            ends_at: None,
            targeting: serde_json::json!({}),
            source_category: SourceCategory::Government,
            status: CampaignStatus::Draft,
            created_at: Utc::now(),
        });
        store.seed_publisher(Publisher {
            id: publisher_id,
            name: "Mission Local".to_string(),
            created_at: Utc::now(),
        });
        (campaign_id, publisher_id)
    }

    fn seed_match(store: &MemoryStore, campaign_id: Uuid, publisher_id: Uuid) -> Uuid {
        let match_id = Uuid::new_v4();
        store.seed_match(CampaignMatch {
            id: match_id,
            campaign_id,
            publisher_id,
            is_selected: false,
            created_at: Utc::now(),
        });
        match_id
    }

    fn request(campaign_id: Uuid, publisher_id: Uuid, match_id: Option<Uuid>) -> OrderRequest {
        OrderRequest {
            campaign_id,
            publisher_id,
            match_id,
            line_items: vec![
                LineItemRequest {
                    deliverable_type: "SPONSORED_POST".to_string(),
                    platform: "INSTAGRAM".to_string(),
                    quantity: 2,
                    unit_price_cents: 15000,
                    description: None,
                },
                LineItemRequest {
                    deliverable_type: "NEWSLETTER_FEATURE".to_string(),
                    platform: "NEWSLETTER".to_string(),
                    quantity: 1,
                    unit_price_cents: 30000,
                    description: Some("Top slot".to_string()),
                },
            ],
            delivery_deadline: None,
            notes: None,
        }
    }

    fn factory(store: &Arc<MemoryStore>) -> OrderFactory {
        OrderFactory::new(store.clone(), PricingEngine::new(0.15))
    }

    #[tokio::test]
    async fn test_create_order_materializes_aggregate() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, publisher_id) = seed_pair(&store);
        let match_id = seed_match(&store, campaign_id, publisher_id);

        let created = factory(&store)
            .create_order(request(campaign_id, publisher_id, Some(match_id)))
            .await
            .unwrap();

        assert_eq!(created.order.status, OrderStatus::PendingPublisher);
        assert_eq!(created.order.procurement_status, ProcurementStatus::NotSubmitted);
        assert_eq!(created.order.subtotal_cents, 60000);
        assert_eq!(created.order.platform_fee_cents, 9000);
        assert_eq!(created.order.total_cents, 69000);
        assert_eq!(created.line_items.len(), 2);
        // One deliverable per unit of quantity: 2 + 1
        assert_eq!(created.deliverables.len(), 3);
        assert!(created
            .deliverables
            .iter()
            .all(|d| d.status == DeliverableStatus::Pending));

        // Persisted view matches the returned aggregate
        let stored = store.order(created.order.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 69000);
        let deliverables = store.deliverables(created.order.id).await.unwrap();
        assert_eq!(deliverables.len(), 3);

        // The match was flipped selected
        let m = store.campaign_match(match_id).await.unwrap().unwrap();
        assert!(m.is_selected);

        // Creation logged in the status history
        let history = store.status_history(created.order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, OrderStatus::PendingPublisher);
        assert_eq!(history[0].from_status, None);
    }

    #[tokio::test]
    async fn test_empty_line_items_rejected_before_write() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, publisher_id) = seed_pair(&store);

        let mut req = request(campaign_id, publisher_id, None);
        req.line_items.clear();

        let result = factory(&store).create_order(req).await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_campaign_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (_, publisher_id) = seed_pair(&store);

        let result = factory(&store)
            .create_order(request(Uuid::new_v4(), publisher_id, None))
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_publisher_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, _) = seed_pair(&store);

        let result = factory(&store)
            .create_order(request(campaign_id, Uuid::new_v4(), None))
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_selected_match_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, publisher_id) = seed_pair(&store);
        let match_id = seed_match(&store, campaign_id, publisher_id);

        factory(&store)
            .create_order(request(campaign_id, publisher_id, Some(match_id)))
            .await
            .unwrap();

        // Second order against the same match must not double-book it
        let result = factory(&store)
            .create_order(request(campaign_id, publisher_id, Some(match_id)))
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mismatched_pairing_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, publisher_id) = seed_pair(&store);
        let (other_campaign, _) = seed_pair(&store);
        let match_id = seed_match(&store, other_campaign, publisher_id);

        let result = factory(&store)
            .create_order(request(campaign_id, publisher_id, Some(match_id)))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}
