//! Paddle Session Server - hosts one session with the arena physics
//!
//! Loads configuration, installs logging, spawns the session task and logs every
//! session event until shutdown. A transport layer attaches through
//! [`SessionHandle`].

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paddle_session_server::config::{Config, LogFormat};
use paddle_session_server::game::{ArenaPhysics, SessionEvent, SessionHandle, SessionService};
use paddle_session_server::util::time::{init_server_time, uptime_secs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    // Initialize server time tracking
    init_server_time();

    info!(
        width = config.field.width,
        height = config.field.height,
        "Starting Paddle Session Server"
    );

    let physics = ArenaPhysics::new(config.field, config.ball_radius);
    let (session_task, handle) = SessionService::spawn(physics, config.session());

    log_events(&handle).await?;

    shutdown_signal().await;

    // Dropping the last handle lets the session task finish
    drop(handle);
    session_task.await?;

    info!(uptime_secs = uptime_secs(), "Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Forward every session event to the log
async fn log_events(handle: &SessionHandle) -> anyhow::Result<()> {
    handle
        .subscribe(Box::new(|event: &SessionEvent| match event {
            SessionEvent::PlayerScoreChanged { scores } => {
                info!(event = event.name(), ?scores, "Session event");
            }
            _ => info!(event = event.name(), "Session event"),
        }))
        .await?;
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
