//! `Reporter` (C8): an at-most-once status publisher driven by job-resource
//! annotations. Owns only the decision (`should_report`) and the message
//! shape (`build_report_message`, `derive_storage_path`); the bus client
//! itself is the injected [`MessageSink`] (the *message-bus SDK*
//! collaborator named out of scope in §1).

use std::time::Duration;

use gateway_types::error::GatewayError;
use gateway_types::report::ReportMessage;
use gateway_types::request::ExecutionType;
use gateway_types::resource::JobResource;

/// Deadline applied to every publish attempt (§4.8).
pub const PUBLISH_DEADLINE: Duration = Duration::from_secs(10);

/// The injected bus-publish collaborator. Returns the bus's server-assigned
/// message id on success.
#[async_trait::async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish(&self, project: &str, topic: &str, message: &ReportMessage) -> Result<String, GatewayError>;
}

/// `shouldReport(resource)` (§4.8): both `pubsub.project` and `pubsub.topic`
/// must resolve to a non-empty value via [`JobResource::should_report`].
pub fn should_report(resource: &JobResource) -> bool {
    resource.should_report()
}

/// Storage-alias rewrite token and its canonical scheme (§4.8 step 2). The
/// source's built-in alias for its primary object store.
const STORAGE_ALIAS_TOKEN: &str = "gcs/";
const CANONICAL_STORAGE_SCHEME: &str = "gs";

/// Derive `gcs_path` from a job's `status.url` and the catalog's configured
/// `job_url_prefix` (§4.8, concrete scenario #4). Pure and therefore
/// directly testable without a bus client.
pub fn derive_storage_path(url: &str, job_url_prefix: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    let mut remaining = url.strip_prefix(job_url_prefix).unwrap_or(url).to_string();

    if let Some(rest) = remaining.strip_prefix(STORAGE_ALIAS_TOKEN) {
        remaining = format!("{CANONICAL_STORAGE_SCHEME}/{rest}");
    }

    match remaining.split_once('/') {
        Some((scheme, rest)) if !scheme.is_empty() => format!("{scheme}://{rest}"),
        _ => format!("{CANONICAL_STORAGE_SCHEME}://{remaining}"),
    }
}

/// Build the wire `ReportMessage` for `resource`. `execution_type` is
/// supplied by the caller: a `JobResource` does not retain the execution
/// type it was created as (§3), only the reconciler that owns the
/// resource's lifecycle knows it.
pub fn build_report_message(
    resource: &JobResource,
    execution_type: ExecutionType,
    job_url_prefix: &str,
) -> ReportMessage {
    let status = resource.status.state.unwrap_or(gateway_types::resource::JobState::Triggered);
    ReportMessage {
        project: resource.pubsub_project().unwrap_or_default().to_string(),
        topic: resource.pubsub_topic().unwrap_or_default().to_string(),
        runid: resource.pubsub_run_id().unwrap_or_default().to_string(),
        status,
        url: resource.status.url.clone(),
        gcs_path: derive_storage_path(&resource.status.url, job_url_prefix),
        refs: resource.spec.refs.iter().cloned().collect(),
        job_type: execution_type,
        job_name: resource.spec.job_name.clone(),
    }
}

/// `report(resource)` (§4.8): publish exactly one message for the
/// resource's current terminal state, time-bounded by [`PUBLISH_DEADLINE`].
/// Callers are responsible for `should_report` and for marking the resource
/// reported on success (idempotence is owned by the caller per §4.8 step 4).
pub async fn report(
    sink: &dyn MessageSink,
    resource: &JobResource,
    execution_type: ExecutionType,
    job_url_prefix: &str,
) -> Result<String, GatewayError> {
    let project = resource
        .pubsub_project()
        .ok_or_else(|| GatewayError::InvalidArgument("resource has no pubsub project".into()))?
        .to_string();
    let topic = resource
        .pubsub_topic()
        .ok_or_else(|| GatewayError::InvalidArgument("resource has no pubsub topic".into()))?
        .to_string();
    let message = build_report_message(resource, execution_type, job_url_prefix);

    match tokio::time::timeout(PUBLISH_DEADLINE, sink.publish(&project, &topic, &message)).await {
        Ok(Ok(message_id)) => {
            tracing::debug!(%project, %topic, %message_id, job_name = %message.job_name, "status report published");
            Ok(message_id)
        }
        Ok(Err(e)) => {
            tracing::warn!(%project, %topic, job_name = %message.job_name, error = %e, "status report publish failed");
            Err(e)
        }
        Err(_) => {
            tracing::warn!(%project, %topic, job_name = %message.job_name, "status report publish timed out");
            Err(GatewayError::Upstream(format!(
                "publish to {project}/{topic} did not complete within {PUBLISH_DEADLINE:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::resource::{JobResource, JobSpec, JobState, JobStatus};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn resource(url: &str) -> JobResource {
        let mut annotations = BTreeMap::new();
        annotations.insert("pubsub.project".to_string(), "p".to_string());
        annotations.insert("pubsub.topic".to_string(), "t".to_string());
        annotations.insert("pubsub.runID".to_string(), "r".to_string());
        JobResource {
            id: "job-1".into(),
            spec: JobSpec {
                job_name: "unit".into(),
                cluster: "build".into(),
                tenant_id: "platform".into(),
                pod_template: serde_json::Value::Null,
                refs: None,
            },
            labels: BTreeMap::new(),
            annotations,
            status: JobStatus {
                state: Some(JobState::Success),
                description: String::new(),
                url: url.into(),
            },
        }
    }

    #[test]
    fn derive_storage_path_strips_prefix_and_rewrites_alias() {
        let path = derive_storage_path(
            "https://host/view/gs/bucket/job/42",
            "https://host/view/",
        );
        assert_eq!(path, "gs://bucket/job/42");
    }

    #[test]
    fn derive_storage_path_is_empty_for_empty_url() {
        assert_eq!(derive_storage_path("", "https://host/view/"), "");
    }

    #[test]
    fn derive_storage_path_defaults_to_canonical_scheme_without_a_prefix_segment() {
        let path = derive_storage_path("https://host/view/justapath", "https://host/view/");
        assert_eq!(path, "gs://justapath");
    }

    #[test]
    fn build_report_message_reads_annotations_over_labels() {
        let resource = resource("https://host/view/gs/bucket/job/42");
        let message = build_report_message(&resource, ExecutionType::Presubmit, "https://host/view/");
        assert_eq!(message.project, "p");
        assert_eq!(message.topic, "t");
        assert_eq!(message.runid, "r");
        assert_eq!(message.gcs_path, "gs://bucket/job/42");
        assert_eq!(message.status, JobState::Success);
    }

    #[test]
    fn build_report_message_falls_back_to_labels_when_annotations_absent() {
        let mut resource = resource("https://host/view/gs/bucket/job/42");
        resource.annotations.clear();
        resource.labels.insert("pubsub.project".into(), "p".into());
        resource.labels.insert("pubsub.topic".into(), "t".into());
        resource.labels.insert("pubsub.runID".into(), "r".into());
        let message = build_report_message(&resource, ExecutionType::Postsubmit, "https://host/view/");
        assert_eq!(message.runid, "r");
    }

    struct CountingSink {
        calls: AtomicUsize,
        last: Mutex<Option<ReportMessage>>,
    }

    #[async_trait::async_trait]
    impl MessageSink for CountingSink {
        async fn publish(&self, _project: &str, _topic: &str, message: &ReportMessage) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(message.clone());
            Ok("server-id-1".into())
        }
    }

    #[tokio::test]
    async fn report_publishes_once_and_returns_the_server_id() {
        let sink = CountingSink {
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        };
        let resource = resource("https://host/view/gs/bucket/job/42");
        let id = report(&sink, &resource, ExecutionType::Presubmit, "https://host/view/")
            .await
            .unwrap();
        assert_eq!(id, "server-id-1");
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl MessageSink for FailingSink {
        async fn publish(&self, _project: &str, _topic: &str, _message: &ReportMessage) -> Result<String, GatewayError> {
            Err(GatewayError::Upstream("bus unavailable".into()))
        }
    }

    #[tokio::test]
    async fn report_surfaces_publish_failure() {
        let resource = resource("https://host/view/gs/bucket/job/42");
        let result = report(&FailingSink, &resource, ExecutionType::Presubmit, "https://host/view/").await;
        assert!(matches!(result, Err(GatewayError::Upstream(_))));
    }

    #[tokio::test]
    async fn report_rejects_a_resource_with_no_pubsub_project() {
        let mut resource = resource("https://host/view/gs/bucket/job/42");
        resource.annotations.remove("pubsub.project");
        let sink = CountingSink {
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        };
        let result = report(&sink, &resource, ExecutionType::Presubmit, "https://host/view/").await;
        assert!(matches!(result, Err(GatewayError::InvalidArgument(_))));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }
}
