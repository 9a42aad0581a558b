use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authoritative order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    PendingPublisher,
    Accepted,
    InProgress,
    Delivered,
    Completed,
    Paid,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::PendingPublisher => "PENDING_PUBLISHER",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(OrderStatus::Draft),
            "PENDING_PUBLISHER" => Some(OrderStatus::PendingPublisher),
            "ACCEPTED" => Some(OrderStatus::Accepted),
            "IN_PROGRESS" => Some(OrderStatus::InProgress),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "COMPLETED" => Some(OrderStatus::Completed),
            "PAID" => Some(OrderStatus::Paid),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "REJECTED" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    /// Next status in the forward chain, if any
    fn successor(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Draft => Some(OrderStatus::PendingPublisher),
            OrderStatus::PendingPublisher => Some(OrderStatus::Accepted),
            OrderStatus::Accepted => Some(OrderStatus::InProgress),
            OrderStatus::InProgress => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => Some(OrderStatus::Completed),
            OrderStatus::Completed => Some(OrderStatus::Paid),
            OrderStatus::Paid | OrderStatus::Cancelled | OrderStatus::Rejected => None,
        }
    }

    /// Cancelled/Rejected are reachable from any state before Completed
    fn accepts_termination(&self) -> bool {
        matches!(
            self,
            OrderStatus::Draft
                | OrderStatus::PendingPublisher
                | OrderStatus::Accepted
                | OrderStatus::InProgress
                | OrderStatus::Delivered
        )
    }

    /// Whether `from -> to` is a legal forward edge of the lifecycle graph.
    /// The engine never moves an order backward.
    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        match to {
            OrderStatus::Cancelled | OrderStatus::Rejected => from.accepts_termination(),
            _ => from.successor() == Some(to),
        }
    }
}

/// Paperwork-oriented procurement status, moving independently of fulfillment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcurementStatus {
    NotSubmitted,
    Submitted,
    Approved,
    Paid,
}

impl ProcurementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementStatus::NotSubmitted => "NOT_SUBMITTED",
            ProcurementStatus::Submitted => "SUBMITTED",
            ProcurementStatus::Approved => "APPROVED",
            ProcurementStatus::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_SUBMITTED" => Some(ProcurementStatus::NotSubmitted),
            "SUBMITTED" => Some(ProcurementStatus::Submitted),
            "APPROVED" => Some(ProcurementStatus::Approved),
            "PAID" => Some(ProcurementStatus::Paid),
            _ => None,
        }
    }
}

/// Deliverable workflow status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliverableStatus {
    Pending,
    Submitted,
    RevisionRequested,
    Approved,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliverableStatus::Pending => "PENDING",
            DeliverableStatus::Submitted => "SUBMITTED",
            DeliverableStatus::RevisionRequested => "REVISION_REQUESTED",
            DeliverableStatus::Approved => "APPROVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(DeliverableStatus::Pending),
            "SUBMITTED" => Some(DeliverableStatus::Submitted),
            "REVISION_REQUESTED" => Some(DeliverableStatus::RevisionRequested),
            "APPROVED" => Some(DeliverableStatus::Approved),
            _ => None,
        }
    }

    /// A deliverable can be claimed for submission from these states
    pub fn is_claimable(&self) -> bool {
        matches!(
            self,
            DeliverableStatus::Pending | DeliverableStatus::RevisionRequested
        )
    }

    /// Counts as done for the order auto-advance check
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            DeliverableStatus::Submitted | DeliverableStatus::Approved
        )
    }

    pub fn can_transition(from: DeliverableStatus, to: DeliverableStatus) -> bool {
        matches!(
            (from, to),
            (DeliverableStatus::Pending, DeliverableStatus::Submitted)
                | (DeliverableStatus::RevisionRequested, DeliverableStatus::Submitted)
                | (DeliverableStatus::Submitted, DeliverableStatus::Approved)
                | (DeliverableStatus::Submitted, DeliverableStatus::RevisionRequested)
        )
    }
}

/// The authoritative fulfillment record for a matched advertiser/publisher pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub publisher_id: Uuid,
    pub match_id: Option<Uuid>,
    pub status: OrderStatus,
    pub procurement_status: ProcurementStatus,
    pub purchase_order_number: Option<String>,
    pub subtotal_cents: i64,
    pub platform_fee_cents: i64,
    pub total_cents: i64,
    pub delivery_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One priced row within an order. Immutable once created; its quantity
/// determines how many deliverables are spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub deliverable_type: String,
    pub platform: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One fulfillable unit of work, exactly one per unit of line-item quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_item_id: Uuid,
    pub platform: String,
    pub deliverable_type: String,
    pub status: DeliverableStatus,
    pub submission_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub submission_notes: Option<String>,
    pub metrics: serde_json::Value,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Publisher-supplied proof of work for one deliverable unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionDraft {
    pub url: Option<String>,
    pub screenshot_url: Option<String>,
    pub notes: Option<String>,
    pub metrics: Option<serde_json::Value>,
}

impl SubmissionDraft {
    /// A submission must carry at least one piece of evidence
    pub fn has_content(&self) -> bool {
        self.url.is_some() || self.screenshot_url.is_some() || self.notes.is_some()
    }
}

/// Append-only status history entry keyed by order id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub id: Uuid,
    pub order_id: Uuid,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    pub notes: Option<String>,
}

impl OrderStatusChange {
    pub fn new(
        order_id: Uuid,
        from_status: Option<OrderStatus>,
        to_status: OrderStatus,
        changed_by: Option<&str>,
        notes: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            from_status,
            to_status,
            changed_at: Utc::now(),
            changed_by: changed_by.map(String::from),
            notes: notes.map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain() {
        use OrderStatus::*;
        let chain = [
            Draft,
            PendingPublisher,
            Accepted,
            InProgress,
            Delivered,
            Completed,
            Paid,
        ];
        for pair in chain.windows(2) {
            assert!(OrderStatus::can_transition(pair[0], pair[1]));
            // Never backward
            assert!(!OrderStatus::can_transition(pair[1], pair[0]));
        }
    }

    #[test]
    fn test_no_skipping_states() {
        use OrderStatus::*;
        assert!(!OrderStatus::can_transition(PendingPublisher, InProgress));
        assert!(!OrderStatus::can_transition(Accepted, Delivered));
        assert!(!OrderStatus::can_transition(InProgress, Completed));
        assert!(!OrderStatus::can_transition(Delivered, Paid));
    }

    #[test]
    fn test_termination_edges() {
        use OrderStatus::*;
        for from in [Draft, PendingPublisher, Accepted, InProgress, Delivered] {
            assert!(OrderStatus::can_transition(from, Cancelled));
            assert!(OrderStatus::can_transition(from, Rejected));
        }
        // Completed and beyond can no longer be cancelled
        assert!(!OrderStatus::can_transition(Completed, Cancelled));
        assert!(!OrderStatus::can_transition(Paid, Cancelled));
        assert!(!OrderStatus::can_transition(Cancelled, Rejected));
    }

    #[test]
    fn test_deliverable_transitions() {
        use DeliverableStatus::*;
        assert!(DeliverableStatus::can_transition(Pending, Submitted));
        assert!(DeliverableStatus::can_transition(Submitted, Approved));
        assert!(DeliverableStatus::can_transition(Submitted, RevisionRequested));
        assert!(DeliverableStatus::can_transition(RevisionRequested, Submitted));

        assert!(!DeliverableStatus::can_transition(Pending, Approved));
        assert!(!DeliverableStatus::can_transition(Approved, Submitted));
        assert!(!DeliverableStatus::can_transition(Approved, RevisionRequested));
    }

    #[test]
    fn test_claimable_and_settled() {
        use DeliverableStatus::*;
        assert!(Pending.is_claimable());
        assert!(RevisionRequested.is_claimable());
        assert!(!Submitted.is_claimable());
        assert!(!Approved.is_claimable());

        assert!(Submitted.is_settled());
        assert!(Approved.is_settled());
        assert!(!Pending.is_settled());
        assert!(!RevisionRequested.is_settled());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::Draft,
            OrderStatus::PendingPublisher,
            OrderStatus::Accepted,
            OrderStatus::InProgress,
            OrderStatus::Delivered,
            OrderStatus::Completed,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("BOGUS"), None);
    }

    #[test]
    fn test_submission_draft_content() {
        let empty = SubmissionDraft::default();
        assert!(!empty.has_content());

        let draft = SubmissionDraft {
            url: Some("https://example.com/post/1".to_string()),
            ..Default::default()
        };
        assert!(draft.has_content());
    }
}
