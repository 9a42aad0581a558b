use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub campaign_id: Uuid,
    pub publisher_id: Uuid,
    pub total_cents: i64,
    pub deliverable_count: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct DeliverableSubmittedEvent {
    pub deliverable_id: Uuid,
    pub order_id: Uuid,
    pub line_item_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderDeliveredEvent {
    pub order_id: Uuid,
    pub campaign_id: Uuid,
    pub timestamp: i64,
}

/// Envelope fanned out on the API broadcast channel (SSE).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketplaceEvent {
    OrderCreated(OrderCreatedEvent),
    DeliverableSubmitted(DeliverableSubmittedEvent),
    OrderDelivered(OrderDeliveredEvent),
}
