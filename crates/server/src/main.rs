use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lettermeet_server::{config, db, mailer, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lettermeet_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Starting LetterMeet server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Initialize database
    let db = db::Database::new(&config.database.path).await?;
    db.run_migrations().await?;

    // Outbound mail transport
    let mailer = mailer::Mailer::from_config(&config.smtp)?;

    // Create app state
    let state = AppState::new(db, config.clone(), mailer);

    // Build router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
