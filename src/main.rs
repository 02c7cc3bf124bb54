//! Helper Fulfillment server
//!
//! Serves the fulfillment webhook for the conversational agent.

use helper_fulfillment::catalog::ResponseCatalog;
use helper_fulfillment::config::{ContextBackend, FulfillmentConfig};
use helper_fulfillment::context::SqliteContextStore;
use helper_fulfillment::dispatch::{Dispatcher, HandlerTable};
use helper_fulfillment::webhook::{create_router, AppState, ContextSource};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helper_fulfillment=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = FulfillmentConfig::from_env()?;

    // Response catalogs are loaded once and shared read-only
    let catalog = Arc::new(ResponseCatalog::load(config.responses_dir.as_deref())?);
    tracing::info!(
        source = %config
            .responses_dir
            .as_ref()
            .map_or_else(|| "bundled".to_string(), |dir| dir.display().to_string()),
        "Response catalogs loaded"
    );

    let dispatcher = Dispatcher::new(catalog, HandlerTable::standard())?;
    tracing::info!(
        intents = ?dispatcher.handlers().intents().collect::<Vec<_>>(),
        "Intent handlers registered"
    );

    let contexts = match config.context_backend {
        ContextBackend::Request => ContextSource::Request,
        ContextBackend::Sqlite => {
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %config.db_path.display(), "Opening session context database");
            let store = SqliteContextStore::open(&config.db_path)?;

            // Sessions that stopped mid-conversation never age out on their own
            let retention = chrono::Duration::hours(i64::from(config.context_retention_hours));
            let pruned = store.prune_older_than(retention)?;
            tracing::info!(
                pruned,
                retention_hours = config.context_retention_hours,
                "Pruned idle session contexts"
            );
            let _pruning = store.spawn_pruning(retention, PRUNE_INTERVAL);

            ContextSource::sqlite(store)
        }
    };

    let app = create_router(AppState::new(Arc::new(dispatcher), contexts))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Helper fulfillment listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
