pub mod analysis;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod models;
pub mod participants;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod state;
pub mod storage;
pub mod store;
pub mod tasks;
pub mod versions;
pub mod workers;

pub use workers::{default_handlers, JobContext, Worker, WorkerSettings};

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
