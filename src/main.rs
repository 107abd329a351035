use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use owldone::api::router;
use owldone::config::AppConfig;
use owldone::services::ReconcileScheduler;
use owldone::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "owldone=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let bind_addr = config.bind_addr;
    let interval = config.reconcile_interval;
    if config.time_travel_enabled {
        info!("time travel enabled; simulated dates only render");
    }

    let state = AppState::new(pool, config);

    match interval {
        Some(interval) => {
            let scheduler = ReconcileScheduler::new(Arc::clone(&state.lifecycle), interval);
            tokio::spawn(async move {
                scheduler.start().await;
            });
        }
        None => info!("background reconcile disabled"),
    }

    let app = router(state);

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
