use std::sync::Arc;

use tracing::{error, info, warn};

use feedrelay::{
    CircuitBreaker, Config, Database, DeliveryTransport, Dispatcher, HttpFeedFetcher,
    LogTransport, Pipeline, Scheduler, TelegraphPublisher, WebhookTransport,
};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = feedrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedrelay::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("feedrelay stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> feedrelay::Result<()> {
    config.validate()?;
    info!("feedrelay - feed relay");

    let db = Arc::new(Database::open(&config.database.path).await?);

    let fetcher = Arc::new(HttpFeedFetcher::new(&config.fetch)?);
    let mut pipeline =
        Pipeline::new(Arc::clone(&db), fetcher).with_concurrency(config.fetch.max_concurrent_items);
    if config.telegraph.enabled {
        let publisher = Arc::new(TelegraphPublisher::new(&config.telegraph)?);
        pipeline = pipeline.with_transcoder(publisher, config.telegraph.min_body_length);
        info!("Telegraph transcoding enabled");
    }

    let transport: Arc<dyn DeliveryTransport> = match &config.dispatch.webhook_url {
        Some(url) => {
            info!("Delivering to webhook {}", url);
            Arc::new(WebhookTransport::new(url.as_str())?)
        }
        None => {
            warn!("No webhook configured, messages are only logged");
            Arc::new(LogTransport)
        }
    };
    let dispatcher = Dispatcher::new(
        transport,
        config.dispatch.preview_length,
        config.dispatch.max_concurrent_deliveries,
    );

    let scheduler = Scheduler::new(
        db,
        Arc::new(pipeline),
        Arc::new(dispatcher),
        CircuitBreaker::new(config.scheduler.error_threshold),
        config.scheduler.tick_secs,
    );

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await;
    Ok(())
}
