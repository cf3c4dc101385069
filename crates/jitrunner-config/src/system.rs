//! System configuration parsing.
//!
//! Every field has a default, so an empty document is a valid configuration
//! for local use. Processes call [`SystemConfig::validate`] with their
//! [`Role`] to check the fields they actually need.
//!
//! ```kdl
//! listen "0.0.0.0:3000"
//!
//! queue {
//!     url "https://sqs.eu-west-1.amazonaws.com/123456789012/webhooks"
//!     visibility-timeout-secs 300
//!     wait-time-secs 20
//!     max-messages 10
//!     max-receive-count 5
//! }
//!
//! github {
//!     api-url "https://api.github.com"
//!     web-url "https://github.com"
//!     secret-name "github-app-secret"
//! }
//!
//! dispatch {
//!     target-label "self-hosted"
//!     max-concurrency 8
//! }
//!
//! build {
//!     project "github-actions-runner"
//! }
//!
//! bootstrap {
//!     runner-version "2.316.0"
//!     runner-label "codebuild-runner"
//! }
//! ```

use kdl::{KdlDocument, KdlNode};
use std::path::Path;
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

/// Default config file looked up when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "jitrunner.kdl";

/// Longest long-poll wait SQS accepts.
const MAX_WAIT_TIME_SECS: u64 = 20;

/// Which process is validating the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Webhook intake server: needs a queue to send to.
    Intake,
    /// Queue worker: needs a queue, a secret and a build project.
    Worker,
    /// One-off dispatch: needs a secret and a build project, no queue.
    Dispatch,
}

/// System-wide configuration.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Address the intake server binds to.
    pub listen: String,
    pub queue: QueueConfig,
    pub github: GitHubSettings,
    pub dispatch: DispatchConfig,
    pub build: BuildConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub url: Option<String>,
    /// Visibility timeout configured on the queue. Informational only; the
    /// worker does not coordinate its own work with it.
    pub visibility_timeout: Duration,
    pub wait_time: Duration,
    pub max_messages: u32,
    /// Receive count after which the queue dead-letters a message.
    pub max_receive_count: u32,
}

#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    pub web_url: String,
    /// Name of the secret holding `app_id` and `private_key`.
    pub secret_name: Option<String>,
    /// Shared secret for webhook signature checks. Checks are off when unset.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub target_label: String,
    pub max_concurrency: usize,
    /// In-flight dedup marker lifetime. Dedup is off when unset.
    pub dedup_ttl: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub project: Option<String>,
    /// Send the rendered bootstrap buildspec with every build.
    pub inline_buildspec: bool,
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub runner_version: String,
    pub runner_label: String,
    pub runner_user: String,
    pub download_base: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            queue: QueueConfig::default(),
            github: GitHubSettings::default(),
            dispatch: DispatchConfig::default(),
            build: BuildConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            visibility_timeout: Duration::from_secs(300),
            wait_time: Duration::from_secs(20),
            max_messages: 10,
            max_receive_count: 5,
        }
    }
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            secret_name: None,
            webhook_secret: None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            target_label: "self-hosted".to_string(),
            max_concurrency: 8,
            dedup_ttl: None,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            runner_version: "2.316.0".to_string(),
            runner_label: "codebuild-runner".to_string(),
            runner_user: "runner-user".to_string(),
            download_base: "https://github.com/actions/runner/releases/download".to_string(),
        }
    }
}

impl SystemConfig {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] if it
    /// exists, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => parse_system_config(&std::fs::read_to_string(path)?)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                parse_system_config(&std::fs::read_to_string(DEFAULT_CONFIG_PATH)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment variables looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("JITRUNNER_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = non_empty("QUEUE_URL") {
            self.queue.url = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_APP_SECRET_NAME") {
            self.github.secret_name = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_WEBHOOK_SECRET") {
            self.github.webhook_secret = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_API_URL") {
            self.github.api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty("CODEBUILD_PROJECT_NAME") {
            self.build.project = Some(v);
        }
    }

    /// Check the fields `role` depends on.
    pub fn validate(&self, role: Role) -> ConfigResult<()> {
        if matches!(role, Role::Intake | Role::Worker) && self.queue.url.is_none() {
            return Err(ConfigError::MissingField("queue url".to_string()));
        }

        if matches!(role, Role::Worker | Role::Dispatch) {
            if self.github.secret_name.is_none() {
                return Err(ConfigError::MissingField("github secret-name".to_string()));
            }
            if self.build.project.is_none() {
                return Err(ConfigError::MissingField("build project".to_string()));
            }
        }

        if role == Role::Intake {
            self.listen
                .parse::<std::net::SocketAddr>()
                .map_err(|e| invalid("listen", e.to_string()))?;
        }

        if self.queue.wait_time.as_secs() > MAX_WAIT_TIME_SECS {
            return Err(invalid(
                "queue wait-time-secs",
                format!("must be at most {}", MAX_WAIT_TIME_SECS),
            ));
        }
        if self.queue.max_messages == 0 || self.queue.max_messages > 10 {
            return Err(invalid("queue max-messages", "must be between 1 and 10"));
        }
        if self.dispatch.max_concurrency == 0 {
            return Err(invalid("dispatch max-concurrency", "must be positive"));
        }
        if self.dispatch.target_label.is_empty() {
            return Err(invalid("dispatch target-label", "must not be empty"));
        }

        for (field, value) in [
            ("github api-url", &self.github.api_url),
            ("github web-url", &self.github.web_url),
        ] {
            url::Url::parse(value).map_err(|e| invalid(field, e.to_string()))?;
        }

        Ok(())
    }
}

/// Parse system configuration from KDL text.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SystemConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "listen" => {
                config.listen = required_string(node, "listen")?;
            }
            "queue" => parse_queue(node, &mut config.queue)?,
            "github" => parse_github(node, &mut config.github)?,
            "dispatch" => parse_dispatch(node, &mut config.dispatch)?,
            "build" => parse_build(node, &mut config.build)?,
            "bootstrap" => parse_bootstrap(node, &mut config.bootstrap)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_queue(node: &KdlNode, queue: &mut QueueConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "url" => queue.url = Some(required_string(child, "queue url")?),
            "visibility-timeout-secs" => {
                let secs = required_u64(child, "queue visibility-timeout-secs")?;
                queue.visibility_timeout = Duration::from_secs(secs);
            }
            "wait-time-secs" => {
                let secs = required_u64(child, "queue wait-time-secs")?;
                queue.wait_time = Duration::from_secs(secs);
            }
            "max-messages" => {
                queue.max_messages = required_u32(child, "queue max-messages")?;
            }
            "max-receive-count" => {
                queue.max_receive_count = required_u32(child, "queue max-receive-count")?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_github(node: &KdlNode, github: &mut GitHubSettings) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "api-url" => github.api_url = required_string(child, "github api-url")?,
            "web-url" => github.web_url = required_string(child, "github web-url")?,
            "secret-name" => {
                github.secret_name = Some(required_string(child, "github secret-name")?)
            }
            "webhook-secret" => {
                github.webhook_secret = Some(required_string(child, "github webhook-secret")?)
            }
            _ => {}
        }
    }
    github.api_url = github.api_url.trim_end_matches('/').to_string();
    github.web_url = github.web_url.trim_end_matches('/').to_string();
    Ok(())
}

fn parse_dispatch(node: &KdlNode, dispatch: &mut DispatchConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "target-label" => {
                dispatch.target_label = required_string(child, "dispatch target-label")?
            }
            "max-concurrency" => {
                dispatch.max_concurrency = required_u32(child, "dispatch max-concurrency")? as usize;
            }
            "dedup-ttl-secs" => {
                let secs = required_u64(child, "dispatch dedup-ttl-secs")?;
                dispatch.dedup_ttl = (secs > 0).then(|| Duration::from_secs(secs));
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_build(node: &KdlNode, build: &mut BuildConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "project" => build.project = Some(required_string(child, "build project")?),
            "inline-buildspec" => {
                build.inline_buildspec = get_first_bool_arg(child)
                    .ok_or_else(|| invalid("build inline-buildspec", "expected #true or #false"))?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_bootstrap(node: &KdlNode, bootstrap: &mut BootstrapConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "runner-version" => {
                bootstrap.runner_version = required_string(child, "bootstrap runner-version")?
            }
            "runner-label" => {
                bootstrap.runner_label = required_string(child, "bootstrap runner-label")?
            }
            "runner-user" => {
                bootstrap.runner_user = required_string(child, "bootstrap runner-user")?
            }
            "download-base" => {
                bootstrap.download_base = required_string(child, "bootstrap download-base")?
                    .trim_end_matches('/')
                    .to_string()
            }
            _ => {}
        }
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

// Helper functions for extracting values from KDL nodes

fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|c| c.nodes()).unwrap_or_default()
}

fn get_first_arg(node: &KdlNode) -> Option<&kdl::KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_first_bool_arg(node: &KdlNode) -> Option<bool> {
    get_first_arg(node).and_then(|v| v.as_bool())
}

fn required_string(node: &KdlNode, field: &str) -> ConfigResult<String> {
    match get_first_arg(node) {
        Some(value) => value
            .as_string()
            .map(|s| s.to_string())
            .ok_or_else(|| invalid(field, "expected a string")),
        None => Err(ConfigError::MissingField(field.to_string())),
    }
}

fn required_u64(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    match get_first_arg(node) {
        Some(value) => value
            .as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| invalid(field, "expected a non-negative integer")),
        None => Err(ConfigError::MissingField(field.to_string())),
    }
}

fn required_u32(node: &KdlNode, field: &str) -> ConfigResult<u32> {
    let value = required_u64(node, field)?;
    u32::try_from(value).map_err(|_| invalid(field, "value too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn worker_kdl() -> &'static str {
        r#"
            listen "127.0.0.1:8080"

            queue {
                url "https://sqs.eu-west-1.amazonaws.com/123456789012/webhooks"
                visibility-timeout-secs 120
                wait-time-secs 10
                max-messages 5
            }

            github {
                api-url "https://ghe.example.com/api/v3/"
                secret-name "github-app-secret"
            }

            dispatch {
                target-label "gpu"
                max-concurrency 2
                dedup-ttl-secs 600
            }

            build {
                project "runner-project"
                inline-buildspec #true
            }
        "#
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_system_config(worker_kdl()).unwrap();

        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(
            config.queue.url.as_deref(),
            Some("https://sqs.eu-west-1.amazonaws.com/123456789012/webhooks")
        );
        assert_eq!(config.queue.visibility_timeout, Duration::from_secs(120));
        assert_eq!(config.queue.wait_time, Duration::from_secs(10));
        assert_eq!(config.queue.max_messages, 5);
        assert_eq!(config.queue.max_receive_count, 5);
        assert_eq!(config.github.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.github.secret_name.as_deref(), Some("github-app-secret"));
        assert_eq!(config.dispatch.target_label, "gpu");
        assert_eq!(config.dispatch.max_concurrency, 2);
        assert_eq!(config.dispatch.dedup_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.build.project.as_deref(), Some("runner-project"));
        assert!(config.build.inline_buildspec);
        assert!(config.validate(Role::Worker).is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_system_config("").unwrap();
        assert_eq!(config.dispatch.target_label, "self-hosted");
        assert_eq!(config.queue.visibility_timeout, Duration::from_secs(300));
        assert!(config.dispatch.dedup_ttl.is_none());
        assert!(config.github.webhook_secret.is_none());
        assert_eq!(config.bootstrap.runner_version, "2.316.0");
    }

    #[test]
    fn test_wrong_value_type() {
        let result = parse_system_config(r#"queue { max-messages "ten" }"#);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_missing_value() {
        let result = parse_system_config("build { project }");
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("QUEUE_URL", "https://sqs.example/queue"),
            ("GITHUB_APP_SECRET_NAME", "from-env"),
            ("CODEBUILD_PROJECT_NAME", "env-project"),
            ("GITHUB_WEBHOOK_SECRET", ""),
        ]);

        let mut config = parse_system_config(worker_kdl()).unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.queue.url.as_deref(), Some("https://sqs.example/queue"));
        assert_eq!(config.github.secret_name.as_deref(), Some("from-env"));
        assert_eq!(config.build.project.as_deref(), Some("env-project"));
        assert!(config.github.webhook_secret.is_none());
    }

    #[test]
    fn test_validate_by_role() {
        let mut config = SystemConfig::default();
        assert!(matches!(
            config.validate(Role::Intake),
            Err(ConfigError::MissingField(_))
        ));

        config.queue.url = Some("https://sqs.example/queue".to_string());
        assert!(config.validate(Role::Intake).is_ok());
        assert!(config.validate(Role::Worker).is_err());

        config.github.secret_name = Some("secret".to_string());
        config.build.project = Some("project".to_string());
        assert!(config.validate(Role::Worker).is_ok());
    }

    #[test]
    fn test_validate_dispatch_does_not_need_queue() {
        let mut config = SystemConfig::default();
        config.github.secret_name = Some("secret".to_string());
        config.build.project = Some("project".to_string());
        assert!(config.validate(Role::Dispatch).is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let mut config = SystemConfig::default();
        config.queue.url = Some("https://sqs.example/queue".to_string());

        config.queue.wait_time = Duration::from_secs(30);
        assert!(config.validate(Role::Intake).is_err());
        config.queue.wait_time = Duration::from_secs(20);

        config.dispatch.max_concurrency = 0;
        assert!(config.validate(Role::Intake).is_err());
        config.dispatch.max_concurrency = 1;

        config.listen = "not an address".to_string();
        assert!(config.validate(Role::Intake).is_err());
    }
}
