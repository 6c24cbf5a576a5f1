use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use common::database::{DatabaseConfig, init_pool};
use hike::state::AppState;
use hike::store::PostgresHikeStore;
use hike::{routes, store::HikeStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting hike service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store: Arc<dyn HikeStore> = Arc::new(PostgresHikeStore::new(pool));
    let app_state = AppState::new(store);

    info!("Hike service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Hike service listening on 0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
