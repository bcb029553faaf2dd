use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved annotation/label keys that drive the reporter (§6).
pub const ANNOTATION_PUBSUB_PROJECT: &str = "pubsub.project";
pub const ANNOTATION_PUBSUB_TOPIC: &str = "pubsub.topic";
pub const ANNOTATION_PUBSUB_RUN_ID: &str = "pubsub.runID";
/// Set by the reporter once a terminal state has been published, so a
/// republish is never sent twice for the same (resource, state).
pub const ANNOTATION_REPORTED: &str = "pubsub.reported";

/// The job-resource status state machine (§4.8):
/// `(no-report) -> TRIGGERED -> PENDING -> {SUCCESS | FAILURE | ABORTED | ERROR}`.
/// Every non-TRIGGERED transition triggers exactly one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Triggered,
    Pending,
    Success,
    Failure,
    Aborted,
    Error,
}

impl JobState {
    /// Terminal states are the only ones the reporter publishes for.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failure | JobState::Aborted | JobState::Error
        )
    }
}

/// The opaque spec handed to the orchestration cluster by `gateway-creator`.
/// Built by the appropriate spec-builder (periodic / presubmit / postsubmit)
/// as a pure transformation of a `JobDefinition` plus, for non-periodic
/// types, `GitRefs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_name: String,
    pub cluster: String,
    pub tenant_id: String,
    #[serde(default)]
    pub pod_template: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<crate::refs::GitRefs>,
}

/// Status of a `JobResource`, as observed by the reporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub state: Option<JobState>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

/// A created execution: the output of `gateway-creator`, subsequently owned
/// and mutated only by the cluster (§3 Ownership).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResource {
    /// Globally unique; also the pod name.
    pub id: String,
    pub spec: JobSpec,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub status: JobStatus,
}

impl JobResource {
    /// Annotation-or-label lookup: annotation takes precedence, falling
    /// back to the label map for backward compatibility (§6).
    fn annotation_or_label(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .or_else(|| self.labels.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn pubsub_project(&self) -> Option<&str> {
        self.annotation_or_label(ANNOTATION_PUBSUB_PROJECT)
    }

    pub fn pubsub_topic(&self) -> Option<&str> {
        self.annotation_or_label(ANNOTATION_PUBSUB_TOPIC)
    }

    pub fn pubsub_run_id(&self) -> Option<&str> {
        self.annotation_or_label(ANNOTATION_PUBSUB_RUN_ID)
    }

    /// `shouldReport` (§4.8): both project and topic must resolve to a
    /// non-empty value.
    pub fn should_report(&self) -> bool {
        self.pubsub_project().is_some() && self.pubsub_topic().is_some()
    }

    /// Whether the reporter has already marked this resource for its
    /// current terminal state.
    pub fn already_reported(&self) -> bool {
        self.annotations
            .get(ANNOTATION_REPORTED)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}
