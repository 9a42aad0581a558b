use std::net::SocketAddr;
use std::sync::Arc;

use resonate_api::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resonate_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = resonate_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Resonate API on port {}", config.server.port);

    let db = resonate_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to database");
    db.migrate().await.expect("Failed to run migrations");

    // Operator overrides layered over file-config defaults
    let business_rules = db
        .fetch_business_rules(config.business_rules.clone())
        .await
        .expect("Failed to load business rules");

    let store = Arc::new(resonate_store::PgOrderStore::new(db.pool.clone()));
    let app_state = AppState::new(store, business_rules);

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
