use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use resonate_core::{Deliverable, DeliverableStatus, EngineError, OrderStore, SubmissionDraft};

/// Result of a submission or review action, with the auto-advance outcome
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub deliverable: Deliverable,
    /// Whether this action caused the order to reach Delivered
    pub order_delivered: bool,
}

/// Accepts publisher submissions for pending deliverables and advertiser
/// review actions, and evaluates the order auto-advance rule after each.
pub struct SubmissionWorkflow {
    store: Arc<dyn OrderStore>,
}

impl SubmissionWorkflow {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Claim the earliest claimable deliverable for the line item and record
    /// the submission. The claim is an atomic conditional update in the
    /// store; two concurrent submissions always consume distinct units.
    pub async fn submit(
        &self,
        order_id: Uuid,
        line_item_id: Uuid,
        draft: SubmissionDraft,
    ) -> Result<SubmissionOutcome, EngineError> {
        if !draft.has_content() {
            return Err(EngineError::invalid_input(
                "submission requires at least one of url, screenshot, or notes",
            ));
        }

        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order_id)))?;

        let now = Utc::now();
        let deliverable = self
            .store
            .claim_deliverable(order_id, line_item_id, &draft, now)
            .await?;

        let order_delivered = self.store.finish_order_if_fulfilled(order_id, now).await?;
        if order_delivered {
            tracing::info!("Order {} fully submitted, advanced to DELIVERED", order_id);
        }

        Ok(SubmissionOutcome {
            deliverable,
            order_delivered,
        })
    }

    /// Advertiser-side approval: submitted -> approved
    pub async fn approve(&self, deliverable_id: Uuid) -> Result<SubmissionOutcome, EngineError> {
        let now = Utc::now();
        let deliverable = self
            .store
            .update_deliverable_status(
                deliverable_id,
                DeliverableStatus::Submitted,
                DeliverableStatus::Approved,
                now,
            )
            .await?;

        // An approval can complete an order whose final unit was resubmitted
        // while this one was under review
        let order_delivered = self
            .store
            .finish_order_if_fulfilled(deliverable.order_id, now)
            .await?;

        Ok(SubmissionOutcome {
            deliverable,
            order_delivered,
        })
    }

    /// Advertiser-side pushback: submitted -> revision_requested
    pub async fn request_revision(&self, deliverable_id: Uuid) -> Result<Deliverable, EngineError> {
        self.store
            .update_deliverable_status(
                deliverable_id,
                DeliverableStatus::Submitted,
                DeliverableStatus::RevisionRequested,
                Utc::now(),
            )
            .await
    }
}
