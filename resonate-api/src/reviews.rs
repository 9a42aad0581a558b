use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use resonate_core::Deliverable;
use resonate_shared::models::events::{MarketplaceEvent, OrderDeliveredEvent};

use crate::error::AppError;
use crate::orders::SubmitDeliverableResponse;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/deliverables/{id}/approve", post(approve_deliverable))
        .route(
            "/v1/deliverables/{id}/request-revision",
            post(request_revision),
        )
}

/// POST /v1/deliverables/{id}/approve
/// Advertiser accepts a submitted deliverable
pub async fn approve_deliverable(
    State(state): State<AppState>,
    Path(deliverable_id): Path<Uuid>,
) -> Result<Json<SubmitDeliverableResponse>, AppError> {
    let outcome = state.submissions.approve(deliverable_id).await?;

    if outcome.order_delivered {
        if let Some(order) = state.store.order(outcome.deliverable.order_id).await? {
            let _ = state
                .events_tx
                .send(MarketplaceEvent::OrderDelivered(OrderDeliveredEvent {
                    order_id: order.id,
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

/// POST /v1/deliverables/{id}/request-revision
/// Advertiser pushes a submitted deliverable back for rework
pub async fn request_revision(
    State(state): State<AppState>,
    Path(deliverable_id): Path<Uuid>,
) -> Result<Json<Deliverable>, AppError> {
    let deliverable = state.submissions.request_revision(deliverable_id).await?;
    Ok(Json(deliverable))
}
