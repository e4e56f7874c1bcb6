//! Colsync Server binary.

use colsync_server::{app, config::Config, db, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "colsync_server=debug,colsync_engine=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let schema = config.load_schema()?;

    tracing::info!(
        "Starting Colsync Server on {}:{} (schema version {})",
        config.host,
        config.port,
        schema.version
    );

    let pool = db::connect(&config).await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, schema, pool);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
