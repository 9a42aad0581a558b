use uuid::Uuid;

/// Error taxonomy shared by the fulfillment engine and its record stores.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order {order_id} partially created: {detail}")]
    PartialFailure { order_id: Uuid, detail: String },

    #[error("Record store failure: {0}")]
    Dependency(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn dependency(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Dependency(Box::new(err))
    }
}
