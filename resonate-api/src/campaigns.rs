use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use resonate_core::CampaignStatus;
use resonate_order::campaign_display_status;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/campaigns/{id}/display-status", get(display_status))
}

#[derive(Debug, Serialize)]
pub struct DisplayStatusResponse {
    pub campaign_id: Uuid,
    pub stored_status: CampaignStatus,
    pub display_status: CampaignStatus,
    pub match_count: u64,
    pub order_count: u64,
}

/// GET /v1/campaigns/{id}/display-status
/// Dashboard-only projection; never written back to the campaign record
pub async fn display_status(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<DisplayStatusResponse>, AppError> {
    let campaign = state
        .store
        .campaign(campaign_id)
        .await?
        .ok_or_else(|| resonate_core::EngineError::not_found(format!("campaign {}", campaign_id)))?;

    let match_count = state.store.campaign_match_count(campaign_id).await?;
    let order_count = state.store.campaign_order_count(campaign_id).await?;

    Ok(Json(DisplayStatusResponse {
        campaign_id,
        stored_status: campaign.status,
        display_status: campaign_display_status(campaign.status, match_count, order_count),
        match_count,
        order_count,
    }))
}
