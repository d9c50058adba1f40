use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use notif_api::{parse_allowed_origins, router, AppState, ServerConfig, StoreBackend};
use notif_broker::{AmqpBroker, Consumer, ConsumerConfig, ConsumerState};
use notif_core::{
    defaults, CloseReason, Dispatcher, NotificationRepository, SessionConfig, SessionRegistry,
};
use notif_db::{
    database_url_from_env, spawn_pool_monitor, Database, MemoryNotificationRepository, PoolConfig,
};

/// Resolves on SIGTERM or SIGINT (Ctrl-C elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "notif_api=debug,notif_broker=debug,notif_core=info,tower_http=info".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("notif-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let server_config = ServerConfig::from_env()?;
    let consumer_config = ConsumerConfig::from_env();
    let session_config = SessionConfig::from_env();

    let (store, pool_monitor): (Arc<dyn NotificationRepository>, _) =
        match server_config.store_backend {
            StoreBackend::Postgres => {
                let database_url = database_url_from_env();
                let db =
                    Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
                db.migrate().await?;
                info!(subsystem = "db", "Database connected and migrated");
                let monitor = spawn_pool_monitor(
                    db.pool().clone(),
                    Duration::from_secs(defaults::DB_POOL_METRICS_SECS),
                );
                (Arc::new(db.notifications), Some(monitor))
            }
            StoreBackend::Memory => {
                warn!(subsystem = "db", "Using in-memory store; history is lost on restart");
                (Arc::new(MemoryNotificationRepository::new()), None)
            }
        };

    let sessions = Arc::new(SessionRegistry::new());

    let broker = Arc::new(AmqpBroker::new(consumer_config.broker_url.clone()));
    let consumer = Consumer::new(
        broker,
        store.clone(),
        Dispatcher::new(sessions.clone()),
        consumer_config,
    )
    .start();

    // A broker that is unreachable at startup is fatal.
    let mut consumer_state = consumer.watch_state();
    let _ = consumer_state
        .wait_for(|s| *s != ConsumerState::Init)
        .await;
    if consumer.state() == ConsumerState::Fatal {
        let err = match consumer.join().await {
            Err(e) => e,
            Ok(()) => notif_core::Error::Internal("consumer stopped during startup".into()),
        };
        error!(subsystem = "broker", error = %err, "Broker unavailable at startup");
        return Err(err.into());
    }

    let state = AppState::new(store, sessions.clone())
        .with_session_config(session_config)
        .with_consumer_state(consumer.watch_state());
    let app = router(
        state,
        parse_allowed_origins(&server_config.allowed_origins),
    );

    let addr = server_config.socket_addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_sessions = sessions.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            let closed = shutdown_sessions.close_all(CloseReason::Shutdown).await;
            info!(sessions = closed, "Shutdown signal received");
        })
        .await?;

    if let Err(e) = consumer.shutdown().await {
        warn!(error = %e, "Consumer already stopped");
    }
    consumer.join().await?;
    if let Some(monitor) = pool_monitor {
        monitor.abort();
    }
    info!("Server stopped");

    Ok(())
}
