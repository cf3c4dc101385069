//! Runner bootstrap buildspec rendering.
//!
//! The ephemeral build receives `OWNER`, `REPO` and `JOB_CREDENTIAL` as
//! environment variables. The buildspec installs a pinned runner agent,
//! registers it once in ephemeral mode, runs one job and exits.
//!
//! Command templates support:
//! - `${runner.version}` - Pinned runner agent version
//! - `${runner.label}` - Label the runner registers with
//! - `${runner.user}` - Unprivileged user the agent runs as
//! - `${runner.download}` - Release download base URL
//! - `${github.url}` - Web URL registrations point at
//!
//! Shell variables (`$OWNER`, `$REPO`, `$JOB_CREDENTIAL`) are left for the
//! build shell to expand.

use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::system::BootstrapConfig;

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

const INSTALL_COMMANDS: &[&str] = &[
    "echo Installing GitHub Actions Runner...",
    "mkdir -p actions-runner",
    "curl -fsSL -o actions-runner/runner.tar.gz ${runner.download}/v${runner.version}/actions-runner-linux-x64-${runner.version}.tar.gz",
    "tar xzf actions-runner/runner.tar.gz -C actions-runner",
    "chmod +x actions-runner/config.sh actions-runner/run.sh",
    "echo Creating ${runner.user}...",
    "useradd -m ${runner.user}",
    "groupadd docker || true",
    "usermod -aG docker ${runner.user}",
    "chown -R ${runner.user}:docker actions-runner",
    "chmod -R g+rw actions-runner",
    "chown root:docker /var/run/docker.sock || true",
    "chmod 660 /var/run/docker.sock || true",
];

const BUILD_COMMANDS: &[&str] = &[
    "echo Configuring runner...",
    "su ${runner.user} -c \"cd actions-runner && ./config.sh --url ${github.url}/$OWNER/$REPO --token $JOB_CREDENTIAL --labels ${runner.label} --unattended --ephemeral\"",
    "su ${runner.user} -c \"cd actions-runner && ./run.sh\"",
];

/// Variables available to bootstrap command templates.
#[derive(Debug, Clone, Default)]
pub struct BootstrapContext {
    vars: HashMap<String, String>,
}

impl BootstrapContext {
    /// Create a context from bootstrap settings and the registration web URL.
    pub fn new(bootstrap: &BootstrapConfig, web_url: &str) -> Self {
        let mut ctx = Self::default();
        ctx.set("runner.version", &bootstrap.runner_version);
        ctx.set("runner.label", &bootstrap.runner_label);
        ctx.set("runner.user", &bootstrap.runner_user);
        ctx.set("runner.download", &bootstrap.download_base);
        ctx.set("github.url", web_url.trim_end_matches('/'));
        ctx
    }

    /// Add or replace a variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<&str> {
        self.vars.get(var_name).map(|s| s.as_str())
    }

    /// Interpolate all variables in a string. Unknown variables are kept as-is.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Interpolate variables in a list of strings.
    pub fn interpolate_all(&self, inputs: &[&str]) -> Vec<String> {
        inputs.iter().map(|s| self.interpolate(s)).collect()
    }
}

/// Build the buildspec document.
pub fn buildspec(bootstrap: &BootstrapConfig, web_url: &str) -> Value {
    let ctx = BootstrapContext::new(bootstrap, web_url);

    json!({
        "version": "0.2",
        "phases": {
            "install": { "commands": ctx.interpolate_all(INSTALL_COMMANDS) },
            "build": { "commands": ctx.interpolate_all(BUILD_COMMANDS) },
        }
    })
}

/// Render the buildspec as text. JSON is a subset of YAML, so the output is
/// accepted wherever a YAML buildspec is.
pub fn render_buildspec(bootstrap: &BootstrapConfig, web_url: &str) -> String {
    // Serializing a `Value` cannot fail.
    serde_json::to_string_pretty(&buildspec(bootstrap, web_url)).unwrap_or_default()
}
