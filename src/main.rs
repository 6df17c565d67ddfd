use anyhow::Context;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whitelist_registry::{config::AppConfig, db, routes, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "whitelist_registry=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Database connection
    let pool = db::create_pool(&config)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create uploads directory {}",
                config.uploads_dir.display()
            )
        })?;

    let email_service = services::create_email_service(&config);
    let addr = SocketAddr::from((config.host, config.port));

    let app_state = AppState::new(pool, config, email_service);
    let app = routes::app_router(app_state);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
