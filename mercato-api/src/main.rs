use std::net::SocketAddr;
use std::sync::Arc;

use mercato_api::{app, AppState};
use mercato_store::{app_config::Config, DbClient, MemoryStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mercato_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Mercato API on port {}", config.server.port);

    let state = match &config.database {
        Some(database) => {
            let db = DbClient::connect(&database.url)
                .await
                .expect("Failed to connect to PostgreSQL");
            db.migrate().await.expect("Failed to run migrations");
            AppState::with_store(Arc::new(PgStore::new(db.pool.clone())))
        }
        None => {
            tracing::info!("No database configured, using the in-memory store");
            AppState::with_store(Arc::new(MemoryStore::new()))
        }
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app).await.expect("Server error");
}
