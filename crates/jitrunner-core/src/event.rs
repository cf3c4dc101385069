//! Typed view of inbound `workflow_job` webhook events.
//!
//! Only the fields the dispatcher consumes are named. Everything else lands in
//! the flattened `extra` maps and is carried through untouched.
//!
//! Named fields are tolerant: `null` or a value of the wrong type reads as
//! absent, so an odd payload is skipped by filtering instead of failing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// The `action` value that marks a job waiting for a runner.
pub const QUEUED_ACTION: &str = "queued";

/// A webhook payload as delivered by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub workflow_job: Option<WorkflowJob>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `workflow_job` object of a webhook payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowJob {
    /// Stable job identifier, used as the dedup key when dedup is enabled.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// String entries of `labels`. Anything else is dropped.
    #[serde(default, deserialize_with = "string_list")]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `repository` object of a webhook payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryRef {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub owner: Option<RepositoryOwner>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryOwner {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundEvent {
    /// Parse a queued message body.
    ///
    /// Only text that is not JSON at all is an error. A JSON value that is not
    /// an object parses as an empty event.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::InvalidInput(format!("malformed event body: {}", e)))?;
        if !value.is_object() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("malformed event body: {}", e)))
    }

    /// Whether the event announces a newly queued job.
    pub fn is_queued(&self) -> bool {
        self.action.as_deref() == Some(QUEUED_ACTION)
    }

    /// The `(owner, repo)` pair, if both are present and non-empty.
    pub fn coordinates(&self) -> Option<(&str, &str)> {
        let repository = self.repository.as_ref()?;
        let owner = repository.owner.as_ref()?.login.as_deref()?;
        let name = repository.name.as_deref()?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some((owner, name))
    }

    /// Key identifying the job across redeliveries: `owner/repo#job_id`.
    pub fn job_key(&self) -> Option<String> {
        let job_id = self.workflow_job.as_ref()?.id?;
        let (owner, repo) = self.coordinates()?;
        Some(format!("{}/{}#{}", owner, repo, job_id))
    }
}

/// Whether `name` is a plausible GitHub owner or repository name.
///
/// Accepts `[A-Za-z0-9._-]+` except `.` and `..`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let labels = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(label) => Some(label),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(labels)
}

impl WorkflowJob {
    /// Exact, case-sensitive label membership.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_queued_job() {
        let body = r#"{"action":"queued","workflow_job":{"labels":["self-hosted"]},"repository":{"owner":{"login":"acme"},"name":"widget"}}"#;
        let event = InboundEvent::from_json(body).unwrap();

        assert!(event.is_queued());
        assert!(event.workflow_job.as_ref().unwrap().has_label("self-hosted"));
        assert_eq!(event.coordinates(), Some(("acme", "widget")));
    }

    #[test]
    fn test_missing_workflow_job_is_not_an_error() {
        let event = InboundEvent::from_json(r#"{"zen":"Keep it logically awesome."}"#).unwrap();
        assert!(event.workflow_job.is_none());
        assert!(event.action.is_none());
    }

    #[test]
    fn test_labels_default_to_empty() {
        let event = InboundEvent::from_json(r#"{"action":"queued","workflow_job":{}}"#).unwrap();
        let job = event.workflow_job.unwrap();
        assert!(job.labels.is_empty());
        assert!(!job.has_label("self-hosted"));
    }

    #[test]
    fn test_label_match_is_case_sensitive() {
        let job = WorkflowJob {
            labels: vec!["Self-Hosted".to_string()],
            ..Default::default()
        };
        assert!(!job.has_label("self-hosted"));
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let input = json!({
            "action": "queued",
            "workflow_job": {"id": 42, "labels": ["linux"], "run_id": 7},
            "repository": {"name": "widget", "owner": {"login": "acme", "type": "Organization"}, "private": true},
            "sender": {"login": "octocat"}
        });

        let event: InboundEvent = serde_json::from_value(input.clone()).unwrap();
        let output = serde_json::to_value(&event).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_job_key() {
        let event = InboundEvent::from_json(
            r#"{"action":"queued","workflow_job":{"id":99,"labels":[]},"repository":{"owner":{"login":"acme"},"name":"widget"}}"#,
        )
        .unwrap();
        assert_eq!(event.job_key().as_deref(), Some("acme/widget#99"));
    }

    #[test]
    fn test_empty_owner_has_no_coordinates() {
        let event = InboundEvent::from_json(
            r#"{"repository":{"owner":{"login":""},"name":"widget"}}"#,
        )
        .unwrap();
        assert_eq!(event.coordinates(), None);
    }

    #[test]
    fn test_null_labels_read_as_empty() {
        let event =
            InboundEvent::from_json(r#"{"action":"queued","workflow_job":{"labels":null}}"#).unwrap();
        assert!(event.workflow_job.unwrap().labels.is_empty());
    }

    #[test]
    fn test_non_string_labels_are_dropped() {
        let event = InboundEvent::from_json(
            r#"{"workflow_job":{"labels":["self-hosted",3,null,{"name":"x"}]}}"#,
        )
        .unwrap();
        assert_eq!(event.workflow_job.unwrap().labels, vec!["self-hosted"]);
    }

    #[test]
    fn test_wrongly_typed_fields_read_as_absent() {
        let event = InboundEvent::from_json(
            r#"{"action":7,"workflow_job":{"id":"abc","labels":["self-hosted"]},"repository":{"name":null,"owner":"acme"}}"#,
        )
        .unwrap();

        assert!(event.action.is_none());
        let job = event.workflow_job.as_ref().unwrap();
        assert!(job.id.is_none());
        assert!(job.has_label("self-hosted"));
        let repository = event.repository.as_ref().unwrap();
        assert!(repository.name.is_none());
        assert!(repository.owner.is_none());
        assert_eq!(event.coordinates(), None);
    }

    #[test]
    fn test_non_object_workflow_job_reads_as_absent() {
        let event = InboundEvent::from_json(r#"{"action":"queued","workflow_job":"x"}"#).unwrap();
        assert!(event.workflow_job.is_none());
    }

    #[test]
    fn test_non_object_body_is_empty_event() {
        for body in ["[]", "7", "null", r#""queued""#] {
            let event = InboundEvent::from_json(body).unwrap();
            assert!(event.workflow_job.is_none(), "{body}");
            assert!(event.action.is_none(), "{body}");
        }
    }

    #[test]
    fn test_valid_names() {
        for name in ["acme", "widget.rs", "my_repo-2", ".github"] {
            assert!(is_valid_name(name), "{name}");
        }
        for name in ["", ".", "..", "a/b", "mallory/../../repos/acme", "a b", "a;rm", "$(id)", "ü"] {
            assert!(!is_valid_name(name), "{name}");
        }
    }

    #[test]
    fn test_malformed_body() {
        let result = InboundEvent::from_json("not json");
        assert!(matches!(result.unwrap_err(), Error::InvalidInput(_)));
    }
}
