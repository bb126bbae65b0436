use dotenv::dotenv;
use inventory_core::api::create_router;
use inventory_core::auth::{JwtManager, PgAuthProvider};
use inventory_core::config::AppConfig;
use inventory_core::db;
use inventory_core::store::PgStore;
use inventory_core::AppState;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Inventory Server...");

    let config = AppConfig::load()?;

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let jwt = JwtManager::new(
        config.jwt_secret.clone(),
        config.jwt_access_lifetime_secs,
        config.jwt_refresh_lifetime_secs,
    );

    // Create application state
    let store = Arc::new(PgStore::new(pool.clone()));
    let auth = Arc::new(PgAuthProvider::new(pool, jwt));
    let app_state = AppState::new(store, auth);

    // Create router
    let app = create_router(app_state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", address, e))?;

    info!("Server listening on {}", address);

    // Start the server
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
