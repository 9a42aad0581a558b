use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod campaigns;
pub mod error;
pub mod events;
pub mod orders;
pub mod reviews;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(orders::routes())
        .merge(reviews::routes())
        .merge(campaigns::routes())
        .merge(admin::routes())
        .merge(events::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
