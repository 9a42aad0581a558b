use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use resonate_core::{
    Campaign, CampaignMatch, Deliverable, DeliverableStatus, EngineError, NewOrderBundle, Order,
    OrderLineItem, OrderStatus, OrderStatusChange, OrderStore, ProcurementStatus, Publisher,
    SubmissionDraft,
};

#[derive(Default)]
struct Inner {
    campaigns: HashMap<Uuid, Campaign>,
    publishers: HashMap<Uuid, Publisher>,
    matches: HashMap<Uuid, CampaignMatch>,
    orders: HashMap<Uuid, Order>,
    line_items: HashMap<Uuid, OrderLineItem>,
    // Insertion order doubles as creation order for the FIFO claim
    deliverables: Vec<Deliverable>,
    history: Vec<OrderStatusChange>,
}

/// In-memory record store with the same conditional-update semantics as the
/// Postgres implementation. Backs the engine test suites and local runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_after_order_insert: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seed_campaign(&self, campaign: Campaign) {
        self.lock().campaigns.insert(campaign.id, campaign);
    }

    pub fn seed_publisher(&self, publisher: Publisher) {
        self.lock().publishers.insert(publisher.id, publisher);
    }

    pub fn seed_match(&self, m: CampaignMatch) {
        self.lock().matches.insert(m.id, m);
    }

    /// Fault injection: the next create_order persists the order row and then
    /// fails, leaving a partially-created order behind.
    pub fn fail_after_order_insert(&self) {
        self.fail_after_order_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>, EngineError> {
        Ok(self.lock().campaigns.get(&id).cloned())
    }

    async fn publisher(&self, id: Uuid) -> Result<Option<Publisher>, EngineError> {
        Ok(self.lock().publishers.get(&id).cloned())
    }

    async fn campaign_match(&self, id: Uuid) -> Result<Option<CampaignMatch>, EngineError> {
        Ok(self.lock().matches.get(&id).cloned())
    }

    async fn campaign_match_count(&self, campaign_id: Uuid) -> Result<u64, EngineError> {
        Ok(self
            .lock()
            .matches
            .values()
            .filter(|m| m.campaign_id == campaign_id)
            .count() as u64)
    }

    async fn campaign_order_count(&self, campaign_id: Uuid) -> Result<u64, EngineError> {
        Ok(self
            .lock()
            .orders
            .values()
            .filter(|o| o.campaign_id == campaign_id)
            .count() as u64)
    }

    async fn create_order(&self, bundle: &NewOrderBundle) -> Result<(), EngineError> {
        let mut inner = self.lock();

        // Compare-and-set on the match happens before any write so a lost
        // race surfaces as a clean Conflict with nothing persisted
        if let Some(match_id) = bundle.select_match {
            match inner.matches.get(&match_id) {
                None => {
                    return Err(EngineError::not_found(format!(
                        "campaign match {}",
                        match_id
                    )))
                }
                Some(m) if m.is_selected => {
                    return Err(EngineError::conflict(format!(
                        "campaign match {} is already selected",
                        match_id
                    )))
                }
                Some(_) => {}
            }
        }

        let order_id = bundle.order.id;
        inner.orders.insert(order_id, bundle.order.clone());

        if self.fail_after_order_insert.swap(false, Ordering::SeqCst) {
            return Err(EngineError::PartialFailure {
                order_id,
                detail: "line items and deliverables were not persisted".to_string(),
            });
        }

        for item in &bundle.line_items {
            inner.line_items.insert(item.id, item.clone());
        }
        inner.deliverables.extend(bundle.deliverables.iter().cloned());
        if let Some(match_id) = bundle.select_match {
            if let Some(m) = inner.matches.get_mut(&match_id) {
                m.is_selected = true;
            }
        }
        inner.history.push(bundle.change.clone());

        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, EngineError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, EngineError> {
        let mut items: Vec<OrderLineItem> = self
            .lock()
            .line_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    async fn deliverables(&self, order_id: Uuid) -> Result<Vec<Deliverable>, EngineError> {
        Ok(self
            .lock()
            .deliverables
            .iter()
            .filter(|d| d.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_orders(&self, campaign_id: Option<Uuid>) -> Result<Vec<Order>, EngineError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| campaign_id.map_or(true, |c| o.campaign_id == c))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn status_history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderStatusChange>, EngineError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|c| c.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn incomplete_orders(&self) -> Result<Vec<Uuid>, EngineError> {
        let inner = self.lock();
        let mut out = Vec::new();
        for order in inner.orders.values() {
            let expected: u64 = inner
                .line_items
                .values()
                .filter(|i| i.order_id == order.id)
                .map(|i| i.quantity as u64)
                .sum();
            let actual = inner
                .deliverables
                .iter()
                .filter(|d| d.order_id == order.id)
                .count() as u64;
            if expected == 0 || expected != actual {
                out.push(order.id);
            }
        }
        Ok(out)
    }

    async fn claim_deliverable(
        &self,
        order_id: Uuid,
        line_item_id: Uuid,
        draft: &SubmissionDraft,
        now: DateTime<Utc>,
    ) -> Result<Deliverable, EngineError> {
        let mut inner = self.lock();

        let mut any_for_line = false;
        let mut claim: Option<usize> = None;
        for (idx, d) in inner.deliverables.iter().enumerate() {
            if d.order_id != order_id || d.line_item_id != line_item_id {
                continue;
            }
            any_for_line = true;
            if !d.status.is_claimable() {
                continue;
            }
            let better = match claim {
                None => true,
                Some(best) => {
                    let b = &inner.deliverables[best];
                    (d.created_at, d.id) < (b.created_at, b.id)
                }
            };
            if better {
                claim = Some(idx);
            }
        }

        let idx = match claim {
            Some(idx) => idx,
            None if any_for_line => {
                return Err(EngineError::conflict(format!(
                    "all deliverables for line item {} are already submitted",
                    line_item_id
                )))
            }
            None => {
                return Err(EngineError::not_found(format!(
                    "no deliverables for order {} line item {}",
                    order_id, line_item_id
                )))
            }
        };

        let d = &mut inner.deliverables[idx];
        d.status = DeliverableStatus::Submitted;
        if draft.url.is_some() {
            d.submission_url = draft.url.clone();
        }
        if draft.screenshot_url.is_some() {
            d.screenshot_url = draft.screenshot_url.clone();
        }
        if draft.notes.is_some() {
            d.submission_notes = draft.notes.clone();
        }
        if let Some(metrics) = &draft.metrics {
            d.metrics = metrics.clone();
        }
        d.submitted_at = Some(now);
        Ok(d.clone())
    }

    async fn update_deliverable_status(
        &self,
        deliverable_id: Uuid,
        expected: DeliverableStatus,
        to: DeliverableStatus,
        now: DateTime<Utc>,
    ) -> Result<Deliverable, EngineError> {
        let mut inner = self.lock();
        let d = inner
            .deliverables
            .iter_mut()
            .find(|d| d.id == deliverable_id)
            .ok_or_else(|| EngineError::not_found(format!("deliverable {}", deliverable_id)))?;

        if d.status != expected {
            return Err(EngineError::conflict(format!(
                "deliverable {} is {} (expected {})",
                deliverable_id,
                d.status.as_str(),
                expected.as_str()
            )));
        }

        d.status = to;
        if to == DeliverableStatus::Approved {
            d.approved_at = Some(now);
        }
        Ok(d.clone())
    }

    async fn finish_order_if_fulfilled(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut inner = self.lock();

        let status = inner
            .orders
            .get(&order_id)
            .map(|o| o.status)
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))?;
        if status != OrderStatus::InProgress {
            return Ok(false);
        }

        let mut any = false;
        for d in inner.deliverables.iter().filter(|d| d.order_id == order_id) {
            any = true;
            if !d.status.is_settled() {
                return Ok(false);
            }
        }
        if !any {
            // A partially-created order must not advance on vacuous truth
            return Ok(false);
        }

        let order = inner.orders.get_mut(&order_id).ok_or_else(|| {
            EngineError::not_found(format!("order {}", order_id))
        })?;
        order.status = OrderStatus::Delivered;
        order.updated_at = now;
        inner.history.push(OrderStatusChange {
            id: Uuid::new_v4(),
            order_id,
            from_status: Some(OrderStatus::InProgress),
            to_status: OrderStatus::Delivered,
            changed_at: now,
            changed_by: Some("SYSTEM".to_string()),
            notes: Some("All deliverables submitted".to_string()),
        });
        Ok(true)
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        change: &OrderStatusChange,
    ) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))?;

        if order.status != expected {
            return Err(EngineError::conflict(format!(
                "order {} is {} (expected {})",
                order_id,
                order.status.as_str(),
                expected.as_str()
            )));
        }

        order.status = change.to_status;
        order.updated_at = change.changed_at;
        inner.history.push(change.clone());
        Ok(())
    }

    async fn update_procurement(
        &self,
        order_id: Uuid,
        status: ProcurementStatus,
        purchase_order_number: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))?;

        order.procurement_status = status;
        if let Some(po) = purchase_order_number {
            order.purchase_order_number = Some(po.to_string());
        }
        order.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(campaign_id: Uuid) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            campaign_id,
            publisher_id: Uuid::new_v4(),
            match_id: None,
            status: OrderStatus::PendingPublisher,
            procurement_status: ProcurementStatus::NotSubmitted,
            purchase_order_number: None,
            subtotal_cents: 10000,
            platform_fee_cents: 1500,
            total_cents: 11500,
            delivery_deadline: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn bundle_for(order: &Order) -> NewOrderBundle {
        let now = order.created_at;
        let line_item = OrderLineItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            deliverable_type: "SPONSORED_POST".to_string(),
            platform: "INSTAGRAM".to_string(),
            quantity: 1,
            unit_price_cents: 10000,
            total_price_cents: 10000,
            description: None,
            created_at: now,
        };
        let deliverable = Deliverable {
            id: Uuid::new_v4(),
            order_id: order.id,
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
            created_at: now,
        };
        NewOrderBundle {
            order: order.clone(),
            line_items: vec![line_item],
            deliverables: vec![deliverable],
            select_match: None,
            change: OrderStatusChange::new(
                order.id,
                None,
                OrderStatus::PendingPublisher,
                Some("SYSTEM"),
                None,
            ),
        }
    }

    #[tokio::test]
    async fn test_match_selection_wins_at_most_once() {
        let store = MemoryStore::new();
        let match_id = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();
        store.seed_match(CampaignMatch {
            id: match_id,
            campaign_id,
            publisher_id: Uuid::new_v4(),
            is_selected: false,
            created_at: Utc::now(),
        });

        let first = order(campaign_id);
        let mut first_bundle = bundle_for(&first);
        first_bundle.select_match = Some(match_id);
        store.create_order(&first_bundle).await.unwrap();

        let second = order(campaign_id);
        let mut second_bundle = bundle_for(&second);
        second_bundle.select_match = Some(match_id);
        let result = store.create_order(&second_bundle).await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));

        // The losing order left nothing behind
        assert!(store.order(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_is_surfaced_and_detectable() {
        let store = MemoryStore::new();
        let o = order(Uuid::new_v4());
        let bundle = bundle_for(&o);

        store.fail_after_order_insert();
        let result = store.create_order(&bundle).await;
        match result {
            Err(EngineError::PartialFailure { order_id, .. }) => assert_eq!(order_id, o.id),
            other => panic!("expected PartialFailure, got {:?}", other.map(|_| ())),
        }

        // The torn order is visible to reconciliation
        let incomplete = store.incomplete_orders().await.unwrap();
        assert_eq!(incomplete, vec![o.id]);

        // And the auto-advance check refuses to touch it
        store
            .update_order_status(
                o.id,
                OrderStatus::PendingPublisher,
                &OrderStatusChange::new(
                    o.id,
                    Some(OrderStatus::PendingPublisher),
                    OrderStatus::Accepted,
                    None,
                    None,
                ),
            )
            .await
            .unwrap();
        store
            .update_order_status(
                o.id,
                OrderStatus::Accepted,
                &OrderStatusChange::new(
                    o.id,
                    Some(OrderStatus::Accepted),
                    OrderStatus::InProgress,
                    None,
                    None,
                ),
            )
            .await
            .unwrap();
        assert!(!store.finish_order_if_fulfilled(o.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_is_conditional_not_read_then_write() {
        let store = MemoryStore::new();
        let o = order(Uuid::new_v4());
        let bundle = bundle_for(&o);
        let line_item_id = bundle.line_items[0].id;
        store.create_order(&bundle).await.unwrap();

        let draft = SubmissionDraft {
            url: Some("https://example.com/p/1".to_string()),
            ..Default::default()
        };
        store
            .claim_deliverable(o.id, line_item_id, &draft, Utc::now())
            .await
            .unwrap();

        // Pool exhausted: second claim conflicts instead of double-consuming
        let result = store
            .claim_deliverable(o.id, line_item_id, &draft, Utc::now())
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));

        // Unknown line item is NotFound, not Conflict
        let result = store
            .claim_deliverable(o.id, Uuid::new_v4(), &draft, Utc::now())
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_status_cas_rejects_stale_writers() {
        let store = MemoryStore::new();
        let o = order(Uuid::new_v4());
        store.create_order(&bundle_for(&o)).await.unwrap();

        let change = OrderStatusChange::new(
            o.id,
            Some(OrderStatus::PendingPublisher),
            OrderStatus::Accepted,
            None,
            None,
        );
        store
            .update_order_status(o.id, OrderStatus::PendingPublisher, &change)
            .await
            .unwrap();

        // A second writer holding the stale expectation loses
        let result = store
            .update_order_status(o.id, OrderStatus::PendingPublisher, &change)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }
}
