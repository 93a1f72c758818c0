use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};

use clauseiq::{
    analysis::{AnalysisRunner, OpenAiRunner},
    auth::jwt::JwtService,
    config::AppConfig,
    db, init_tracing,
    jobs::PgJobQueue,
    routes::create_router,
    s3::build_storage,
    state::AppState,
    store::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations up to date");

    let storage = Arc::new(build_storage(&config).await?);
    let jwt = JwtService::from_config(&config)?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let queue = Arc::new(PgJobQueue::new(pool));

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST/SERVER_PORT do not form a valid socket address")?;

    let runner: Option<Arc<dyn AnalysisRunner>> = if config.openai_api_key.is_some() {
        Some(Arc::new(OpenAiRunner::from_config(&config)?))
    } else {
        tracing::warn!("OPENAI_API_KEY not set; contract chat is disabled");
        None
    };

    let state = AppState::new(config, store, storage, queue, runner, jwt);
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("api received shutdown signal");
        })
        .await?;

    Ok(())
}
