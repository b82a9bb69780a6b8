use std::net::SocketAddr;
use std::sync::Arc;

use exam_backend::database::pool::{create_pool, run_migrations};
use exam_backend::database::{ExamStore, MemoryExamStore, PgExamStore};
use exam_backend::{
    config::{get_config, init_config},
    create_router, AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    init_config()?;
    let config = get_config();

    let store: Arc<dyn ExamStore> = match &config.database_url {
        Some(_) => {
            let pool = create_pool(config).await?;
            run_migrations(&pool).await?;
            info!("Using Postgres store");
            Arc::new(PgExamStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            Arc::new(MemoryExamStore::new())
        }
    };

    if config.shuffle_seed.is_some() {
        info!("Shuffles are seeded and reproducible");
    }

    let app_state = AppState::new(store, config);
    let app = create_router(app_state, config.api_rps);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
