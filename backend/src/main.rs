use std::sync::Arc;
use bookclub_polls::{
    build_rocket,
    config::Settings,
    members::StoreMembers,
    pg_store::PgStore,
    processor::PollProcessor,
    routes::AppState,
    store::SharedStore,
};
use shuttle_runtime::CustomError;
use sqlx::PgPool;
use tokio::time::{interval, Duration};
use tracing::{info, error};

async fn run_close_sweep(processor: Arc<PollProcessor>, every: Duration) {
    let mut interval = interval(every);
    info!("🧹 Poll closing sweep started ({}s)", every.as_secs());

    loop {
        interval.tick().await;
        match processor.close_expired_polls().await {
            Ok(0) => {}
            Ok(count) => info!("🔒 Closed {} expired polls", count),
            Err(e) => error!("Poll closing sweep failed: {}", e),
        }
    }
}

#[shuttle_runtime::main]
async fn rocket(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secret_store: shuttle_runtime::SecretStore,
) -> shuttle_rocket::ShuttleRocket {
    info!("🚀 Starting book club poll server");

    let settings = Settings::from_secrets(&secret_store);
    info!("⚙️ {:?}", settings);

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(CustomError::new)?;

    info!("📋 Migrations complete");

    let store: SharedStore = Arc::new(PgStore::connect(pool).await.map_err(CustomError::new)?);
    let members = Arc::new(StoreMembers::new(store.clone()));
    let state = AppState::new(PollProcessor::new(store, members, &settings));

    tokio::spawn(run_close_sweep(
        state.processor.clone(),
        Duration::from_secs(settings.sweep_interval_secs),
    ));

    Ok(build_rocket(state, &settings).into())
}
