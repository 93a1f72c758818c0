use std::env;

use anyhow::Result;

use clauseiq::{config::AppConfig, db, init_tracing};

const USAGE: &str = "Usage: maintenance migrate";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("migrate") => migrate()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        "loaded backend configuration"
    );
    Ok(config)
}

fn migrate() -> Result<()> {
    let config = load_config()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let applied = db::run_migrations(&pool)?;
    println!("Applied {applied} migrations.");
    Ok(())
}
