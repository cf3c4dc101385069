//! CLI command implementations.

pub mod serve;
pub mod worker;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use jitrunner_aws::{CodeBuildTrigger, SdkConfig, SecretsManagerStore};
use jitrunner_config::{Role, SystemConfig, render_buildspec};
use jitrunner_dispatcher::{DispatchSettings, Dispatcher};
use jitrunner_github::{AppCredentialBroker, GitHubAppClient};

/// Wire the dispatcher to Secrets Manager, GitHub and CodeBuild.
pub fn build_dispatcher(config: &SystemConfig, sdk_config: &SdkConfig) -> Result<Dispatcher> {
    let secret_name = config
        .github
        .secret_name
        .clone()
        .context("github secret-name is not set")?;
    let project = config
        .build
        .project
        .clone()
        .context("build project is not set")?;

    let broker = AppCredentialBroker::new(
        Arc::new(SecretsManagerStore::new(sdk_config)),
        Arc::new(GitHubAppClient::new(&config.github.api_url)),
        secret_name,
    );

    let settings = DispatchSettings {
        target_label: config.dispatch.target_label.clone(),
        project,
        buildspec: config
            .build
            .inline_buildspec
            .then(|| render_buildspec(&config.bootstrap, &config.github.web_url)),
    };

    let dispatcher = Dispatcher::new(
        Arc::new(broker),
        Arc::new(CodeBuildTrigger::new(sdk_config)),
        settings,
    );

    Ok(match config.dispatch.dedup_ttl {
        Some(ttl) => dispatcher.with_dedup(ttl),
        None => dispatcher,
    })
}

/// Dispatch one event file through the live pipeline.
pub async fn dispatch(config: &SystemConfig, file: &Path) -> Result<()> {
    config.validate(Role::Dispatch).context("Invalid config")?;

    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let sdk_config = jitrunner_aws::load_sdk_config().await;
    let dispatcher = build_dispatcher(config, &sdk_config)?;

    let outcome = dispatcher.dispatch_message(&body).await?;
    println!("{}", outcome);
    Ok(())
}

pub fn buildspec(config: &SystemConfig) {
    println!(
        "{}",
        render_buildspec(&config.bootstrap, &config.github.web_url)
    );
}

/// Parse a config file and report which processes it is complete for.
pub fn validate(path: Option<&Path>) -> Result<()> {
    let config = SystemConfig::load(path).context("Configuration error")?;

    let mut usable = false;
    for (name, role) in [
        ("intake", Role::Intake),
        ("worker", Role::Worker),
        ("dispatch", Role::Dispatch),
    ] {
        match config.validate(role) {
            Ok(()) => {
                usable = true;
                println!("{}: ok", name);
            }
            Err(e) => println!("{}: {}", name, e),
        }
    }

    if !usable {
        anyhow::bail!("configuration is not usable by any process");
    }
    Ok(())
}
