use skinledger::{api, config::Config, db::init_db, Collector, CollectorScheduler, HttpCollector, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over LOG_LEVEL
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path, config.busy_timeout_ms).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    let repo = Arc::new(Repository::new(pool));

    // Connection tests work without a scraper service; scheduled collection needs one.
    let base_url = config.collector_url.clone().unwrap_or_default();
    let collector: Arc<dyn Collector> = match HttpCollector::new(base_url, config.http_proxy.as_ref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to build collector client: {}", e);
            std::process::exit(1);
        }
    };
    let scheduler = Arc::new(CollectorScheduler::new(
        collector,
        repo.clone(),
        config.collect_workers,
    ));
    if config.collector_url.is_none() {
        warn!("COLLECTOR_URL not set, automatic collection is disabled");
    } else if let Err(e) = scheduler.sync_with_config().await {
        warn!("Failed to start collectors: {}", e);
    }

    // Create router
    let app = api::create_router(api::AppState::new(repo, config, scheduler.clone()));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server listening on {}", addr);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
    scheduler.stop_all().await;
}
