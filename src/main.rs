use adboard::{config, db, notify::DbNotificationSink, sweeper};
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/adboard.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let sink = DbNotificationSink;
    let sleep = Duration::from_millis(cfg.app.sweep_interval_ms);
    info!("starting completion sweeper");
    loop {
        match sweeper::complete_finished_ads(&pool, &sink, Local::now().date_naive()).await {
            Ok(completed) => {
                if completed > 0 {
                    info!(completed, "sweep pass done");
                }
            }
            Err(err) => error!(?err, "sweep pass failed"),
        }
        tokio::time::sleep(sleep).await;
    }
}
