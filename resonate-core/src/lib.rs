pub mod campaign;
pub mod error;
pub mod order;
pub mod repository;

pub use campaign::{Campaign, CampaignMatch, CampaignStatus, Publisher, SourceCategory};
pub use error::EngineError;
pub use order::{
    Deliverable, DeliverableStatus, Order, OrderLineItem, OrderStatus, OrderStatusChange,
    ProcurementStatus, SubmissionDraft,
};
pub use repository::{NewOrderBundle, OrderStore};
