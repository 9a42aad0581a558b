use std::sync::Arc;

use resonate_core::OrderStore;
use resonate_order::{OrderFactory, OrderManager, PricingEngine, SubmissionWorkflow};
use resonate_shared::models::events::MarketplaceEvent;
use resonate_store::app_config::BusinessRules;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub factory: Arc<OrderFactory>,
    pub submissions: Arc<SubmissionWorkflow>,
    pub manager: Arc<OrderManager>,
    pub events_tx: broadcast::Sender<MarketplaceEvent>,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, business_rules: BusinessRules) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        let pricing = PricingEngine::new(business_rules.platform_fee_rate);
        Self {
            factory: Arc::new(OrderFactory::new(store.clone(), pricing)),
            submissions: Arc::new(SubmissionWorkflow::new(store.clone())),
            manager: Arc::new(OrderManager::new(store.clone())),
            store,
            events_tx,
            business_rules,
        }
    }
}
