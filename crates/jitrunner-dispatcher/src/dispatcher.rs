//! Dispatcher - filters one queued event and provisions a runner for it.
//!
//! Each message moves through
//! `Received -> (Skipped | FilteredIn) -> Authenticated -> Dispatched`.
//! Skips are successful outcomes. Any failure after filtering is returned to
//! the caller as is; nothing already done is compensated, so a credential
//! minted before a rejected build start is simply abandoned.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::dedup::InFlightGuard;
use jitrunner_core::{
    BuildHandle, BuildInvocation, BuildTrigger, CredentialBroker, Error, InboundEvent, Result,
    is_valid_name,
};

/// Why an event did not lead to a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The event carries no `workflow_job`.
    NoWorkflowJob,
    /// The job is not newly queued.
    ActionNotQueued(Option<String>),
    /// The job does not ask for the target label.
    LabelMissing(Vec<String>),
    /// The same job is already being dispatched by this process.
    Duplicate(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoWorkflowJob => write!(f, "no workflow_job in event"),
            SkipReason::ActionNotQueued(action) => {
                write!(f, "action is {}", action.as_deref().unwrap_or("<none>"))
            }
            SkipReason::LabelMissing(labels) => write!(f, "labels are [{}]", labels.join(", ")),
            SkipReason::Duplicate(key) => write!(f, "job {} already in flight", key),
        }
    }
}

/// Result of a successful dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Dispatched {
        owner: String,
        repo: String,
        build: BuildHandle,
    },
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            DispatchOutcome::Dispatched { owner, repo, build } => {
                write!(f, "dispatched {}/{} as build {}", owner, repo, build.build_id)
            }
        }
    }
}

/// Static dispatch settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Label a job must request to be served.
    pub target_label: String,
    /// Build project every runner is started in.
    pub project: String,
    /// Inline buildspec sent with every build, if any.
    pub buildspec: Option<String>,
}

/// An event that passed filtering.
struct FilteredIn<'a> {
    owner: &'a str,
    repo: &'a str,
    job_key: Option<String>,
}

/// Filters events and orchestrates credential broker then build trigger.
///
/// Holds no per-message state besides the optional dedup markers, so one
/// instance can serve any number of concurrent messages.
pub struct Dispatcher {
    broker: Arc<dyn CredentialBroker>,
    trigger: Arc<dyn BuildTrigger>,
    settings: DispatchSettings,
    dedup: Option<InFlightGuard>,
}

impl Dispatcher {
    pub fn new(
        broker: Arc<dyn CredentialBroker>,
        trigger: Arc<dyn BuildTrigger>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            broker,
            trigger,
            settings,
            dedup: None,
        }
    }

    /// Enable in-flight dedup keyed by `owner/repo#job_id`.
    pub fn with_dedup(mut self, ttl: Duration) -> Self {
        self.dedup = Some(InFlightGuard::new(ttl));
        self
    }

    /// Dispatch one raw queue message body.
    pub async fn dispatch_message(&self, body: &str) -> Result<DispatchOutcome> {
        let event = InboundEvent::from_json(body)?;
        self.dispatch(&event).await
    }

    /// Dispatch one parsed event.
    pub async fn dispatch(&self, event: &InboundEvent) -> Result<DispatchOutcome> {
        let filtered = match self.filter(event)? {
            Ok(filtered) => filtered,
            Err(reason) => {
                info!(reason = %reason, "Skip");
                return Ok(DispatchOutcome::Skipped(reason));
            }
        };

        let FilteredIn {
            owner,
            repo,
            job_key,
        } = filtered;

        let marker = match (&self.dedup, job_key) {
            (Some(guard), Some(key)) => {
                if !guard.try_acquire(&key) {
                    warn!(owner, repo, job = %key, "Skip: job already in flight");
                    return Ok(DispatchOutcome::Skipped(SkipReason::Duplicate(key)));
                }
                Some((guard, key))
            }
            _ => None,
        };

        let result = self.provision(owner, repo).await;

        if let (Err(_), Some((guard, key))) = (&result, marker) {
            guard.release(&key);
        }

        result.map(|build| DispatchOutcome::Dispatched {
            owner: owner.to_string(),
            repo: repo.to_string(),
            build,
        })
    }

    /// Apply the filtering policy.
    ///
    /// The outer `Result` is a processing failure (a matching job without a
    /// usable repository). The inner one separates matches from skips.
    fn filter<'a>(
        &self,
        event: &'a InboundEvent,
    ) -> Result<std::result::Result<FilteredIn<'a>, SkipReason>> {
        let Some(job) = &event.workflow_job else {
            return Ok(Err(SkipReason::NoWorkflowJob));
        };

        if !event.is_queued() {
            return Ok(Err(SkipReason::ActionNotQueued(event.action.clone())));
        }

        if !job.has_label(&self.settings.target_label) {
            return Ok(Err(SkipReason::LabelMissing(job.labels.clone())));
        }

        let (owner, repo) = event.coordinates().ok_or_else(|| {
            Error::InvalidInput("queued job without repository owner/name".to_string())
        })?;

        // Owner and repo end up in API paths and in the runner's shell command.
        if !is_valid_name(owner) || !is_valid_name(repo) {
            return Err(Error::InvalidInput(format!(
                "invalid repository coordinates {:?}/{:?}",
                owner, repo
            )));
        }

        Ok(Ok(FilteredIn {
            owner,
            repo,
            job_key: event.job_key(),
        }))
    }

    /// Credential broker, then build trigger, strictly in that order.
    async fn provision(&self, owner: &str, repo: &str) -> Result<BuildHandle> {
        info!(owner, repo, "Job matched; requesting job credential");
        let credential = self.broker.issue(owner, repo).await?;

        let mut invocation =
            BuildInvocation::for_repository(&self.settings.project, owner, repo, &credential);
        if let Some(buildspec) = &self.settings.buildspec {
            invocation = invocation.with_buildspec(buildspec.clone());
        }

        let build = self.trigger.start(&invocation).await?;
        info!(
            owner,
            repo,
            backend = self.trigger.name(),
            build_id = %build.build_id,
            "Runner build started"
        );
        Ok(build)
    }
}
