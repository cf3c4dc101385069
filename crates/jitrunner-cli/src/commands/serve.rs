//! `jitrunner serve`

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use jitrunner_api::{AppState, serve, shutdown_signal};
use jitrunner_aws::SqsQueue;
use jitrunner_config::{Role, SystemConfig};
use jitrunner_core::MessageQueue;
use jitrunner_dispatcher::{MemoryQueue, Worker};

use super::build_dispatcher;
use super::worker::{options, worker_id};

pub async fn run(config: &SystemConfig, memory_queue: bool) -> Result<()> {
    if memory_queue {
        return run_local(config).await;
    }

    config.validate(Role::Intake).context("Invalid config")?;
    let queue_url = config.queue.url.clone().context("queue url is not set")?;

    let sdk_config = jitrunner_aws::load_sdk_config().await;
    let state = AppState::new(Arc::new(SqsQueue::new(&sdk_config, queue_url)))
        .with_webhook_secret(config.github.webhook_secret.clone());

    let listener = bind(config).await?;
    serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

/// Intake and worker in one process, sharing an in-memory queue.
async fn run_local(config: &SystemConfig) -> Result<()> {
    config.validate(Role::Dispatch).context("Invalid config")?;

    let listener = bind(config).await?;
    let sdk_config = jitrunner_aws::load_sdk_config().await;
    let queue: Arc<dyn MessageQueue> = Arc::new(MemoryQueue::new(config.queue.visibility_timeout));
    let worker = Worker::new(
        worker_id(),
        queue.clone(),
        Arc::new(build_dispatcher(config, &sdk_config)?),
        options(config),
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let worker_task = tokio::spawn(async move {
        worker
            .run(async {
                let _ = stop_rx.await;
            })
            .await
    });

    info!("Using in-memory queue; events are lost on exit");
    let state = AppState::new(queue).with_webhook_secret(config.github.webhook_secret.clone());
    let served = serve(listener, state, shutdown_signal()).await;

    let _ = stop_tx.send(());
    worker_task.await.context("Worker task failed")?;
    served?;
    Ok(())
}

async fn bind(config: &SystemConfig) -> Result<TcpListener> {
    TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))
}
