//! `jitrunner worker`

use anyhow::{Context, Result};
use std::sync::Arc;

use jitrunner_api::shutdown_signal;
use jitrunner_aws::SqsQueue;
use jitrunner_config::{Role, SystemConfig};
use jitrunner_dispatcher::{Worker, WorkerOptions};

use super::build_dispatcher;

pub async fn run(config: &SystemConfig) -> Result<()> {
    config.validate(Role::Worker).context("Invalid config")?;
    let queue_url = config.queue.url.clone().context("queue url is not set")?;

    let sdk_config = jitrunner_aws::load_sdk_config().await;
    let dispatcher = build_dispatcher(config, &sdk_config)?;

    let worker = Worker::new(
        worker_id(),
        Arc::new(SqsQueue::new(&sdk_config, queue_url)),
        Arc::new(dispatcher),
        options(config),
    );
    worker.run(shutdown_signal()).await;
    Ok(())
}

pub fn options(config: &SystemConfig) -> WorkerOptions {
    WorkerOptions {
        max_messages: config.queue.max_messages,
        wait_time: config.queue.wait_time,
        max_concurrency: config.dispatch.max_concurrency,
        max_receive_count: config.queue.max_receive_count,
    }
}

pub fn worker_id() -> String {
    format!("worker-{}", std::process::id())
}
