//! `Creator` (C5): turns a resolved [`JobSpec`] into a [`JobResource`] and
//! submits it to the orchestration cluster via an injected [`JobStore`].
//!
//! The cluster API itself is out of scope (§1); this crate owns only id
//! generation, env stamping, and failure reporting around that one call.
//! [`report_rejection`] extends that same failure-reporting hook to
//! admission rejections, which never reach `create` at all.

use std::collections::BTreeMap;

use gateway_types::error::GatewayError;
use gateway_types::resource::{JobResource, JobState, JobStatus};
use gateway_types::JobSpec;
use uuid::Uuid;

/// The injected cluster-submission collaborator (the *orchestration cluster
/// API*, out of scope per §1). `create` is expected to persist the resource
/// and return; the assigned identifier is already stamped by this crate
/// before the call, since it must be time-ordered and known up front.
pub trait JobStore: Send + Sync {
    fn create(&self, resource: &JobResource) -> Result<(), GatewayError>;
}

/// The failure-transition reporting hook named in §4.5 ("reports a failure
/// transition"). Distinct from `gateway-reporter`'s bus publish: this is a
/// local, synchronous notification raised at the point of failure, not a
/// reconciliation-driven publish.
pub trait CreationFailureReporter: Send + Sync {
    fn report_failure(&self, resource: &JobResource, error: &GatewayError);
}

/// Append each `(key, value)` from `envs` into `pod_template`'s `env` array
/// under the convention `{"env": [{"name": ..., "value": ...}]}`, skipping
/// any key already present. Never overwrites an existing entry (§4.5).
fn stamp_env(pod_template: &mut serde_json::Value, envs: &BTreeMap<String, String>) {
    if envs.is_empty() {
        return;
    }
    if !pod_template.is_object() {
        *pod_template = serde_json::json!({});
    }
    let obj = pod_template.as_object_mut().expect("just ensured object");
    let env_array = obj
        .entry("env")
        .or_insert_with(|| serde_json::Value::Array(Vec::new()));
    if !env_array.is_array() {
        *env_array = serde_json::Value::Array(Vec::new());
    }
    let array = env_array.as_array_mut().expect("just ensured array");
    let existing: std::collections::HashSet<String> = array
        .iter()
        .filter_map(|entry| entry.get("name").and_then(|n| n.as_str()))
        .map(String::from)
        .collect();

    for (key, value) in envs {
        if existing.contains(key) {
            continue;
        }
        array.push(serde_json::json!({ "name": key, "value": value }));
    }
}

/// `create(spec, labels, annotations, envs) -> JobResource | FAIL` (§4.5).
///
/// Generates a UUIDv7 id (time-ordered, per the design assumption), stamps
/// the pod template's env, and submits via `store`. Any store failure is
/// surfaced as `GatewayError::Internal` and routed through `reporter` as a
/// failure transition before being returned to the caller.
pub fn create(
    store: &dyn JobStore,
    reporter: Option<&dyn CreationFailureReporter>,
    mut spec: JobSpec,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    envs: BTreeMap<String, String>,
) -> Result<JobResource, GatewayError> {
    stamp_env(&mut spec.pod_template, &envs);

    let resource = JobResource {
        id: Uuid::now_v7().to_string(),
        spec,
        labels,
        annotations,
        status: JobStatus {
            state: Some(JobState::Triggered),
            description: String::new(),
            url: String::new(),
        },
    };

    if let Err(e) = store.create(&resource) {
        let error = GatewayError::Internal(format!("job store create failed: {e}"));
        tracing::warn!(job_name = %resource.spec.job_name, resource_id = %resource.id, error = %error, "job creation failed");
        if let Some(reporter) = reporter {
            let mut failed = resource.clone();
            failed.status.state = Some(JobState::Error);
            failed.status.description = error.to_string();
            reporter.report_failure(&failed, &error);
        }
        return Err(error);
    }

    tracing::debug!(job_name = %resource.spec.job_name, resource_id = %resource.id, "job created");
    Ok(resource)
}

/// Report an admission rejection (tenant mismatch, disallowed cluster) as an
/// ERROR terminal state, the same way [`create`] reports a cluster-submit
/// failure (§4.4: "emit a single comment-style status transition through the
/// reporter"; §7: `PermissionDenied` is "returned to caller + reported as
/// ERROR terminal state"). No resource is created in the cluster for a
/// rejected request; the synthetic `JobResource` built here exists only so
/// the reporter observes the same shape of terminal state it would for a
/// resource that made it further before failing.
pub fn report_rejection(
    reporter: Option<&dyn CreationFailureReporter>,
    spec: &JobSpec,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
    error: &GatewayError,
) {
    let Some(reporter) = reporter else {
        return;
    };

    let resource = JobResource {
        id: Uuid::now_v7().to_string(),
        spec: spec.clone(),
        labels: labels.clone(),
        annotations: annotations.clone(),
        status: JobStatus {
            state: Some(JobState::Error),
            description: error.to_string(),
            url: String::new(),
        },
    };
    reporter.report_failure(&resource, error);
}
