//! jitrunner webhook intake server

use anyhow::Context;
use jitrunner_api::telemetry::init_tracing;
use jitrunner_api::{AppState, serve, shutdown_signal};
use jitrunner_aws::{SqsQueue, load_sdk_config};
use jitrunner_config::{Role, SystemConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_json = std::env::var("JITRUNNER_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    init_tracing(log_json);

    let config_path = std::env::var_os("JITRUNNER_CONFIG").map(PathBuf::from);
    let config = SystemConfig::load(config_path.as_deref()).context("Failed to load config")?;
    config.validate(Role::Intake).context("Invalid config")?;

    let queue_url = config.queue.url.clone().context("queue url is not set")?;
    let sdk_config = load_sdk_config().await;
    let state = AppState::new(Arc::new(SqsQueue::new(&sdk_config, queue_url)))
        .with_webhook_secret(config.github.webhook_secret.clone());

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;

    serve(listener, state, shutdown_signal()).await?;

    Ok(())
}
