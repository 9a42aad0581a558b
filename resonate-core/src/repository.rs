use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::campaign::{Campaign, CampaignMatch, Publisher};
use crate::error::EngineError;
use crate::order::{
    Deliverable, DeliverableStatus, Order, OrderLineItem, OrderStatus, OrderStatusChange,
    ProcurementStatus, SubmissionDraft,
};

/// Everything the factory persists for one order, committed as a unit.
///
/// A store that cannot commit the whole bundle atomically must report
/// `PartialFailure` carrying the order id whenever the order row landed but a
/// later write did not; it must never report such an outcome as success.
#[derive(Debug, Clone)]
pub struct NewOrderBundle {
    pub order: Order,
    pub line_items: Vec<OrderLineItem>,
    pub deliverables: Vec<Deliverable>,
    /// Match to flip `is_selected` on, compare-and-set against `false`
    pub select_match: Option<Uuid>,
    pub change: OrderStatusChange,
}

/// Record-store abstraction for the fulfillment engine.
///
/// The engine talks to this trait, never to a database product directly. The
/// conditional-update methods are the concurrency contract: claims and status
/// flips must be atomic compare-and-set operations, never read-then-write.
#[async_trait]
pub trait OrderStore: Send + Sync {
    // Collaborator records (read-only except `select_match`)

    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>, EngineError>;

    async fn publisher(&self, id: Uuid) -> Result<Option<Publisher>, EngineError>;

    async fn campaign_match(&self, id: Uuid) -> Result<Option<CampaignMatch>, EngineError>;

    /// Matches proposed for a campaign, for the display-status projection
    async fn campaign_match_count(&self, campaign_id: Uuid) -> Result<u64, EngineError>;

    /// Orders placed against a campaign, for the display-status projection
    async fn campaign_order_count(&self, campaign_id: Uuid) -> Result<u64, EngineError>;

    // Order aggregate

    async fn create_order(&self, bundle: &NewOrderBundle) -> Result<(), EngineError>;

    async fn order(&self, id: Uuid) -> Result<Option<Order>, EngineError>;

    async fn line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, EngineError>;

    async fn deliverables(&self, order_id: Uuid) -> Result<Vec<Deliverable>, EngineError>;

    async fn list_orders(&self, campaign_id: Option<Uuid>) -> Result<Vec<Order>, EngineError>;

    async fn status_history(&self, order_id: Uuid)
        -> Result<Vec<OrderStatusChange>, EngineError>;

    /// Orders whose deliverable count does not equal the sum of line-item
    /// quantities. Partially-created orders surface here for reconciliation.
    async fn incomplete_orders(&self) -> Result<Vec<Uuid>, EngineError>;

    // Conditional updates

    /// Atomically claim the earliest-created claimable deliverable for the
    /// line item and mark it submitted with the draft's evidence.
    ///
    /// `NotFound` when the (order, line item) pair has no deliverables at
    /// all; `Conflict` when deliverables exist but every one has already
    /// progressed past a claimable state.
    async fn claim_deliverable(
        &self,
        order_id: Uuid,
        line_item_id: Uuid,
        draft: &SubmissionDraft,
        now: DateTime<Utc>,
    ) -> Result<Deliverable, EngineError>;

    /// Compare-and-set a deliverable from `expected` to `to`, stamping
    /// `approved_at` when `to` is Approved. `Conflict` when the deliverable
    /// is no longer in `expected`.
    async fn update_deliverable_status(
        &self,
        deliverable_id: Uuid,
        expected: DeliverableStatus,
        to: DeliverableStatus,
        now: DateTime<Utc>,
    ) -> Result<Deliverable, EngineError>;

    /// Move the order to Delivered iff it is currently InProgress and no
    /// deliverable remains pending or in revision, appending the history
    /// entry in the same transactional scope. Returns whether the flip
    /// happened; re-running after the flip is a no-op.
    async fn finish_order_if_fulfilled(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError>;

    /// Compare-and-set the authoritative status from `expected` to
    /// `change.to_status`, appending `change` to the history log atomically.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        change: &OrderStatusChange,
    ) -> Result<(), EngineError>;

    async fn update_procurement(
        &self,
        order_id: Uuid,
        status: ProcurementStatus,
        purchase_order_number: Option<&str>,
    ) -> Result<(), EngineError>;
}
