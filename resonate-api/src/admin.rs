use axum::{extract::State, routing::get, Json, Router};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/orders/incomplete", get(incomplete_orders))
}

/// GET /v1/admin/orders/incomplete
/// Orders whose deliverable count does not match the sum of line-item
/// quantities. Reconciliation input for completing or voiding torn creates.
pub async fn incomplete_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let ids = state.store.incomplete_orders().await?;
    Ok(Json(ids))
}
