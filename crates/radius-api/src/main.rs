use clap::Parser;
use radius_api::audit::{AuditEntry, AuditEventType, AuditLogger};
use radius_api::{api, partition, state, Config, MySqlStore, RadiusStore};
use std::process;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RADIUS Management API - users, packages, NAS and sessions for FreeRADIUS
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius-api")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit (doesn't start the API)
    #[arg(short, long)]
    validate: bool,

    /// Build configuration from defaults and environment only
    #[arg(long)]
    env_only: bool,
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Config {
    let loaded = if cli.env_only {
        Config::from_env()
    } else {
        Config::from_file(&cli.config_path)
    };

    match loaded {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");

            if cli.validate || cli.env_only || std::path::Path::new(&cli.config_path).exists() {
                error!("Configuration invalid: {}", e);
                process::exit(1);
            }

            warn!("Could not load config file from: {}", cli.config_path);
            info!("Creating example configuration at: {}", cli.config_path);
            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }
            info!("Please edit {} and restart the API", cli.config_path);
            process::exit(0);
        }
    }
}

fn print_summary(config: &Config) {
    println!("Configuration validated successfully");
    println!();
    println!("  Listen: {}:{}", config.listen_address, config.listen_port);
    println!("  Database: {}", config.database.display_target());
    println!("  Cache backend: {:?}", config.state.backend);
    println!("  Online cache TTL: {}s", config.online_cache_ttl_secs);
    println!(
        "  CoA port: {} (timeout {} ms, {} retries)",
        config.coa.port, config.coa.timeout_ms, config.coa.retries
    );
    println!(
        "  Reconcile: {} (every {}s, stale after {}s)",
        if config.reconcile.enabled { "on" } else { "off" },
        config.reconcile.interval_secs,
        config.reconcile.stale_after_secs
    );
    println!(
        "  Partitions: {} ({} months ahead: {})",
        if config.partitions.enabled { "on" } else { "off" },
        config.partitions.months_ahead,
        config.partitions.tables.join(", ")
    );
    if let Some(ref path) = config.audit_log_path {
        println!("  Audit log: {}", path);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);

    if cli.validate {
        print_summary(&config);
        process::exit(0);
    }

    init_tracing(config.log_level.as_deref().unwrap_or("info"));

    info!("RADIUS Management API v{}", env!("CARGO_PKG_VERSION"));
    if !cli.env_only {
        info!("Loaded configuration from: {}", cli.config_path);
    }

    #[cfg(not(feature = "valkey"))]
    if std::env::var("VALKEY_URL").is_ok() || std::env::var("REDIS_URL").is_ok() {
        warn!("VALKEY_URL is set but this build has no valkey support; using the in-memory cache");
    }

    let store: Arc<dyn RadiusStore> = Arc::new(MySqlStore::connect_lazy(&config.database));
    match store.ping().await {
        Ok(()) => info!(target_db = %config.database.display_target(), "Database reachable"),
        Err(e) => warn!(
            target_db = %config.database.display_target(),
            error = %e,
            "Database not reachable yet; requests will fail until it is"
        ),
    }

    let cache = match state::connect(&config.state).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to connect cache backend: {}", e);
            process::exit(1);
        }
    };
    info!(backend = cache.backend_type(), "Cache backend ready");

    let audit = match AuditLogger::new(config.audit_log_path.clone()) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            error!("Failed to open audit log: {}", e);
            process::exit(1);
        }
    };
    if let Some(path) = audit.file_path() {
        info!("Audit logging enabled: {}", path);
    }

    let app_state = api::AppState::new(Arc::clone(&store), cache, Arc::clone(&audit), &config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    if config.reconcile.enabled {
        info!(
            interval_secs = config.reconcile.interval_secs,
            stale_after_secs = config.reconcile.stale_after_secs,
            "Ghost session reconciliation enabled"
        );
        tasks.push(Arc::clone(&app_state.reconciler).spawn(shutdown_rx.clone()));
    }

    if config.partitions.enabled {
        info!(
            months_ahead = config.partitions.months_ahead,
            tables = ?config.partitions.tables,
            "Partition maintenance enabled"
        );
        tasks.push(partition::spawn_maintenance(
            Arc::clone(&store),
            config.partitions.clone(),
            shutdown_rx.clone(),
        ));
    }

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid listen address: {}", e);
            process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            process::exit(1);
        }
    };

    audit
        .log(
            AuditEntry::new(AuditEventType::ServiceStart)
                .with_details(format!("listening on {}", addr)),
        )
        .await;
    info!("Listening on {}", addr);

    let served = axum::serve(listener, api::router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    audit.log(AuditEntry::new(AuditEventType::ServiceStop)).await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
