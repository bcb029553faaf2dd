//! Shared decode path for both the push and pull trigger modes (§4.7
//! *Decode*): a raw [`BusMessage`] becomes a typed [`JobExecutionRequest`].

use gateway_types::bus::{BusMessage, BusPayload};
use gateway_types::error::GatewayError;
use gateway_types::refs::GitRefs;
use gateway_types::request::{ExecutionType, JobExecutionRequest, PodSpecOptions};

const LABEL_GERRIT_REVISION: &str = "gerrit-revision";

/// Decode `message` and build the internal request: trim whitespace from
/// `name`, translate refs, and apply the gerrit-https prefix rewrite to
/// `refs.org` if the `gerrit-revision` label is present.
pub fn decode_request(message: &BusMessage) -> Result<JobExecutionRequest, GatewayError> {
    let (execution_type, payload) = message.decode()?;
    Ok(build_request(execution_type, payload))
}

fn build_request(execution_type: ExecutionType, payload: BusPayload) -> JobExecutionRequest {
    let job_name = payload.name.trim().to_string();
    let mut refs = payload.refs.map(GitRefs::from_wire);
    if payload.labels.contains_key(LABEL_GERRIT_REVISION) {
        if let Some(refs) = refs.as_mut() {
            refs.apply_gerrit_https_prefix();
        }
    }
    JobExecutionRequest {
        job_name,
        execution_type,
        refs,
        pod_spec_options: PodSpecOptions {
            envs: payload.envs,
            labels: payload.labels,
            annotations: payload.annotations,
        },
    }
}
