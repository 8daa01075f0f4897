//! crawler CLI: run the crawl pipeline, enqueue URLs, inspect records.

use clap::{Parser, Subcommand};
use crawler::broker::{CrawlScheduler, PgmqSubscription};
use crawler::config::Config;
use crawler::db::Db;
use crawler::driver::ChromiumDriver;
use crawler::engine::QueueConsumer;
use crawler::scrape::ScrapeEngine;
use crawler::store::PgRecordStore;
use crawler::supervisor::Supervisor;
use crawler::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Seconds a pgmq read waits for a message before polling again.
const POLL_SECONDS: i32 = 5;

#[derive(Parser)]
#[command(name = "crawler", about = "Crawls application pages into a metadata store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the crawl queue until interrupted
    Serve,
    /// Enqueue URLs for crawling
    Crawl {
        /// Absolute page URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the stored record for an application as JSON
    Show {
        /// Application name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve => cmd_serve(config).await,
        Command::Crawl { urls } => cmd_crawl(config, urls).await,
        Command::Show { name } => cmd_show(config, name).await,
    }
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "channel-crawler".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let mut supervisor = Supervisor::new();
    let pool_size = config.workers as u32 + 2;

    let broker_db = Arc::new(Db::connect("broker", config.broker_url.expose_secret(), pool_size).await?);
    supervisor.start(broker_db.clone());
    let names = config.queue_names();
    names.setup(&broker_db).await?;

    let store_db = Arc::new(Db::connect("store", config.database_url.expose_secret(), pool_size).await?);
    supervisor.start(store_db.clone());
    store_db.migrate().await?;

    let driver = Arc::new(ChromiumDriver::launch(config.chrome_bin.as_deref()).await?);
    supervisor.start(driver.clone());

    let subscription = PgmqSubscription::new(
        broker_db,
        names,
        config.visibility_timeout,
        POLL_SECONDS,
    );
    let consumer = QueueConsumer::new(
        subscription,
        Arc::new(ScrapeEngine::new(driver)),
        Arc::new(PgRecordStore::new(store_db)),
        config.consumer_config(),
        supervisor.token(),
    );
    supervisor.spawn("consumer", consumer.run());

    let token = supervisor.token();
    tokio::spawn(async move {
        shutdown_signal(token.clone()).await;
        token.cancel();
    });

    info!(queue = %config.queue_name, workers = config.workers, "crawler running");
    supervisor.await_closed().await?;
    info!("crawler stopped");
    Ok(())
}

/// Resolves on Ctrl-C, SIGTERM, or when the scope is cancelled elsewhere.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received, draining"),
        _ = terminate => info!("terminate received, draining"),
        _ = token.cancelled() => {}
    }
}

async fn cmd_crawl(config: Config, urls: Vec<String>) -> anyhow::Result<()> {
    let db = Arc::new(Db::connect("broker", config.broker_url.expose_secret(), 1).await?);
    config.queue_names().setup(&db).await?;

    let scheduler = CrawlScheduler::new(Arc::clone(&db), config.queue_name.clone());
    let ids = scheduler.schedule_batch(&urls).await?;
    for (url, id) in urls.iter().zip(&ids) {
        println!("{id}\t{}", url.trim());
    }
    println!("\n{} url(s) enqueued on {}", ids.len(), config.queue_name);
    Ok(())
}

async fn cmd_show(config: Config, name: String) -> anyhow::Result<()> {
    let db = Arc::new(Db::connect("store", config.database_url.expose_secret(), 1).await?);
    db.migrate().await?;

    let store = PgRecordStore::new(db);
    match store.get(name.trim()).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => anyhow::bail!("no record for application '{}'", name.trim()),
    }
    Ok(())
}
