use std::sync::Arc;

use tokio::signal;

use clauseiq::{
    analysis::OpenAiRunner, config::AppConfig, db, default_handlers, init_tracing,
    jobs::PgJobQueue, s3::build_storage, store::PgStore, JobContext, Worker, WorkerSettings,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "worker",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        chat_model = %config.openai_chat_model,
        embedding_model = %config.openai_embedding_model,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let storage = Arc::new(build_storage(&config).await?);
    let runner = Arc::new(OpenAiRunner::from_config(&config)?);
    let store = Arc::new(PgStore::new(pool.clone()));
    let queue = Arc::new(PgJobQueue::new(pool));

    let context = Arc::new(JobContext::new(store, storage, runner));
    let worker = Worker::new(
        context,
        queue,
        default_handlers(),
        WorkerSettings::from_config(&config),
    );

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("worker received shutdown signal");
        }
    }

    Ok(())
}
