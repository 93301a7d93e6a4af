use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lapangan::{api, config::Settings, jobs, service::ServiceContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lapangan=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Lapangan server on {}:{}", settings.server.host, settings.server.port);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;

    tokio::fs::create_dir_all(&settings.storage.uploads_dir).await?;

    let service_context = Arc::new(ServiceContext::new(db_pool, &settings).await);
    tracing::info!(
        "Notification channels: {:?}",
        service_context.dispatcher.channel_names()
    );

    let _sweeps = jobs::spawn_scheduler(service_context.clone(), &settings.scheduler);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app = api::create_app(service_context, Arc::new(settings));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
