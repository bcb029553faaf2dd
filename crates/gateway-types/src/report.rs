use serde::{Deserialize, Serialize};

use crate::refs::GitRefs;
use crate::request::ExecutionType;
use crate::resource::JobState;

/// The JSON payload published by the reporter when a job resource reaches
/// a terminal state (§6). Field names follow the wire format exactly,
/// including the `gcs_path` name retained for backward compatibility even
/// though the storage scheme is no longer necessarily `gs://`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMessage {
    pub project: String,
    pub topic: String,
    pub runid: String,
    pub status: JobState,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gcs_path: String,
    #[serde(default)]
    pub refs: Vec<GitRefs>,
    pub job_type: ExecutionType,
    pub job_name: String,
}
