use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use ara_notification_engine::config::Settings;
use ara_notification_engine::server::{create_app, AppState};
use ara_notification_engine::tasks::{DigestFlushTask, HeartbeatTask};
use ara_notification_engine::telemetry::init_telemetry;
use ara_notification_engine::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    let state = AppState::new(settings.clone());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Redis trigger
    let redis_subscriber = RedisSubscriber::new(
        settings.redis.clone(),
        state.dispatcher.clone(),
        shutdown_tx.subscribe(),
    );
    let redis_handle = tokio::spawn(redis_subscriber.run());

    // Heartbeat and stale-connection cleanup
    let heartbeat_task = HeartbeatTask::new(
        settings.websocket.clone(),
        state.connection_manager.clone(),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(heartbeat_task.run());

    // Digest flushing
    let digest_task = DigestFlushTask::new(
        settings.digest.clone(),
        state.digest_queue.clone(),
        state.outbound.clone(),
        shutdown_tx.subscribe(),
    );
    let digest_handle = tokio::spawn(digest_task.run());

    let app = create_app(state.clone());

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(redis_handle, heartbeat_handle, digest_handle);

    let pending = state.digest_queue.stats();
    if pending.pending_notifications > 0 {
        tracing::warn!(
            buckets = pending.pending_buckets,
            notifications = pending.pending_notifications,
            "Digest buckets not yet due were dropped at shutdown"
        );
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
