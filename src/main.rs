use lc_dailies::{
    config::Config,
    judge::LeetCodeClient,
    leaderboard::{self, LeaderboardService, TimeDecayCalculator},
    shared::AppState,
    store::{InMemoryKvStore, KeyValueStore, PostgresKvStore},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lc_dailies=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LeetCode dailies leaderboard");
    let config = Config::from_env();

    let kv: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            let store = PostgresKvStore::new(pool);
            store.migrate().await?;
            info!("Using PostgreSQL store");
            Arc::new(store)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Arc::new(InMemoryKvStore::new())
        }
    };

    let judge = Arc::new(LeetCodeClient::new(
        config.judge_base_url.clone(),
        config.retry_policy(),
    )?);

    let service = Arc::new(
        LeaderboardService::builder(kv, judge)
            .with_calculator(Arc::new(TimeDecayCalculator::new(config.score_params())))
            .with_sync_options(config.sync_options())
            .with_restart_offset(config.restart_offset)
            .build(),
    );

    if let Some(period) = config.sync_interval {
        info!(period_secs = period.as_secs(), "Scheduling periodic sync");
        leaderboard::spawn_periodic_sync(service.clone(), period);
    }

    let app = leaderboard::router(AppState::new(service)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Server running on http://localhost:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
