use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: String,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_chat_model: String,
    pub openai_embedding_model: String,
    pub job_max_retries: u32,
    pub job_retry_base_delay: Duration,
    pub job_timeout: Duration,
    pub version_insert_max_attempts: u32,
    pub worker_poll_interval: Duration,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").ok();
        let jwt_audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").context("S3_BUCKET must be set")?;
        let openai_api_key = env::var("OPENAI_API_KEY").ok();
        let openai_base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let openai_chat_model =
            env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        let openai_embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let job_max_retries = parse_or("JOB_MAX_RETRIES", 3u32)?;
        let job_retry_base_delay =
            Duration::from_secs(parse_or("JOB_RETRY_BASE_DELAY_SECS", 5u64)?);
        let job_timeout = Duration::from_secs(parse_or("JOB_TIMEOUT_SECS", 300u64)?);
        let version_insert_max_attempts = parse_or("VERSION_INSERT_MAX_ATTEMPTS", 5u32)?;
        let worker_poll_interval =
            Duration::from_millis(parse_or("WORKER_POLL_INTERVAL_MS", 2000u64)?);

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
            openai_api_key,
            openai_base_url,
            openai_chat_model,
            openai_embedding_model,
            job_max_retries,
            job_retry_base_delay,
            job_timeout,
            version_insert_max_attempts,
            worker_poll_interval,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
