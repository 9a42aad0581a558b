use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use resonate_core::EngineError;
use serde_json::json;

/// Wraps the engine taxonomy for the HTTP boundary
#[derive(Debug)]
pub struct AppError(pub EngineError);

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, order_id) = match &self.0 {
            EngineError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_input", msg.clone(), None)
            }
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            EngineError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            EngineError::PartialFailure { order_id, detail } => {
                tracing::error!("Partially created order {}: {}", order_id, detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "partial_failure",
                    detail.clone(),
                    Some(*order_id),
                )
            }
            EngineError::Dependency(err) => {
                tracing::error!("Record store failure: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "dependency_failure",
                    "Record store unavailable".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": code,
            "message": message,
        });
        if let Some(order_id) = order_id {
            body["order_id"] = json!(order_id);
        }

        (status, Json(body)).into_response()
    }
}
