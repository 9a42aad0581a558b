use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use resonate_core::{
    Deliverable, Order, OrderLineItem, OrderStatus, OrderStatusChange, ProcurementStatus,
    SubmissionDraft,
};
use resonate_order::{CreatedOrder, LineItemRequest, OrderRequest};
use resonate_shared::models::events::{
    DeliverableSubmittedEvent, MarketplaceEvent, OrderCreatedEvent, OrderDeliveredEvent,
};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/history", get(order_history))
        .route("/v1/orders/{id}/status", post(update_status))
        .route("/v1/orders/{id}/procurement", post(update_procurement))
        .route(
            "/v1/orders/{id}/line-items/{line_item_id}/submissions",
            post(submit_deliverable),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub campaign_id: Uuid,
    pub publisher_id: Uuid,
    pub match_id: Option<Uuid>,
    pub line_items: Vec<LineItemRequest>,
    pub delivery_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
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
    pub line_items: Vec<OrderLineItem>,
    pub deliverables: Vec<Deliverable>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    fn assemble(order: Order, line_items: Vec<OrderLineItem>, deliverables: Vec<Deliverable>) -> Self {
        Self {
            id: order.id,
            campaign_id: order.campaign_id,
            publisher_id: order.publisher_id,
            match_id: order.match_id,
            status: order.status,
            procurement_status: order.procurement_status,
            purchase_order_number: order.purchase_order_number,
            subtotal_cents: order.subtotal_cents,
            platform_fee_cents: order.platform_fee_cents,
            total_cents: order.total_cents,
            delivery_deadline: order.delivery_deadline,
            notes: order.notes,
            line_items,
            deliverables,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<CreatedOrder> for OrderResponse {
    fn from(created: CreatedOrder) -> Self {
        Self::assemble(created.order, created.line_items, created.deliverables)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitDeliverableRequest {
    pub url: Option<String>,
    pub screenshot_url: Option<String>,
    pub notes: Option<String>,
    pub metrics: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SubmitDeliverableResponse {
    pub deliverable: Deliverable,
    /// Whether this submission caused the order to reach DELIVERED
    pub order_delivered: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub changed_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProcurementRequest {
    pub status: ProcurementStatus,
    pub purchase_order_number: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
/// Materialize an order for a matched campaign/publisher pair
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    // Orders without an explicit deadline get the configured default window
    let delivery_deadline = req.delivery_deadline.or_else(|| {
        Some(Utc::now() + Duration::days(state.business_rules.default_delivery_days))
    });

    let created = state
        .factory
        .create_order(OrderRequest {
            campaign_id: req.campaign_id,
            publisher_id: req.publisher_id,
            match_id: req.match_id,
            line_items: req.line_items,
            delivery_deadline,
            notes: req.notes,
        })
        .await?;

    let _ = state
        .events_tx
        .send(MarketplaceEvent::OrderCreated(OrderCreatedEvent {
            order_id: created.order.id,
            campaign_id: created.order.campaign_id,
            publisher_id: created.order.publisher_id,
            total_cents: created.order.total_cents,
            deliverable_count: created.deliverables.len() as u32,
            timestamp: Utc::now().timestamp(),
        }));

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /v1/orders/{id}
/// Retrieve an order with its line items and deliverables
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .store
        .order(order_id)
        .await?
        .ok_or_else(|| resonate_core::EngineError::not_found(format!("order {}", order_id)))?;
    let line_items = state.store.line_items(order_id).await?;
    let deliverables = state.store.deliverables(order_id).await?;

    Ok(Json(OrderResponse::assemble(order, line_items, deliverables)))
}

/// GET /v1/orders
/// List orders, optionally scoped to a campaign
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.store.list_orders(params.campaign_id).await?;
    Ok(Json(orders))
}

/// GET /v1/orders/{id}/history
/// Append-only status change log for an order
pub async fn order_history(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<OrderStatusChange>>, AppError> {
    state
        .store
        .order(order_id)
        .await?
        .ok_or_else(|| resonate_core::EngineError::not_found(format!("order {}", order_id)))?;

    let history = state.store.status_history(order_id).await?;
    Ok(Json(history))
}

/// POST /v1/orders/{id}/status
/// Externally-driven lifecycle transition (accept, start, complete, pay,
/// cancel, reject)
pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .manager
        .apply_status(
            order_id,
            req.status,
            req.changed_by.as_deref(),
            req.notes.as_deref(),
        )
        .await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/procurement
/// Purchase-order paperwork update from the procurement process
pub async fn update_procurement(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateProcurementRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .manager
        .update_procurement(order_id, req.status, req.purchase_order_number.as_deref())
        .await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/line-items/{line_item_id}/submissions
/// Publisher submits proof of work for one deliverable unit
pub async fn submit_deliverable(
    State(state): State<AppState>,
    Path((order_id, line_item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SubmitDeliverableRequest>,
) -> Result<Json<SubmitDeliverableResponse>, AppError> {
    let outcome = state
        .submissions
        .submit(
            order_id,
            line_item_id,
            SubmissionDraft {
                url: req.url,
                screenshot_url: req.screenshot_url,
                notes: req.notes,
                metrics: req.metrics,
            },
        )
        .await?;

    let _ = state.events_tx.send(MarketplaceEvent::DeliverableSubmitted(
        DeliverableSubmittedEvent {
            deliverable_id: outcome.deliverable.id,
            order_id,
            line_item_id,
            timestamp: Utc::now().timestamp(),
        },
    ));
    if outcome.order_delivered {
        if let Some(order) = state.store.order(order_id).await? {
            let _ = state
                .events_tx
                .send(MarketplaceEvent::OrderDelivered(OrderDeliveredEvent {
                    order_id,
                    campaign_id: order.campaign_id,
                    timestamp: Utc::now().timestamp(),
                }));
        }
    }

    Ok(Json(SubmitDeliverableResponse {
        deliverable: outcome.deliverable,
        order_delivered: outcome.order_delivered,
    }))
}
