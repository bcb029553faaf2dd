use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::refs::GitRefs;

/// The three execution-types a job can be triggered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Periodic,
    Presubmit,
    Postsubmit,
}

/// Env/label/annotation overlays carried on a request. Each key and value
/// must be non-empty; label values additionally pass orchestration validity
/// rules (delegated to the cluster on create — this crate only checks
/// non-emptiness, per §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpecOptions {
    #[serde(default)]
    pub envs: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl PodSpecOptions {
    fn validate_map(name: &str, map: &BTreeMap<String, String>) -> Result<(), GatewayError> {
        for (k, v) in map {
            if k.is_empty() || v.is_empty() {
                return Err(GatewayError::InvalidArgument(format!(
                    "{name} entries must have non-empty keys and values, got key {k:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        Self::validate_map("envs", &self.envs)?;
        Self::validate_map("labels", &self.labels)?;
        Self::validate_map("annotations", &self.annotations)?;
        Ok(())
    }

    /// True iff `labels` carries the gerrit-style revision marker that
    /// triggers the `https://` org prefix rewrite (§4.3, §4.7).
    pub fn is_gerrit_revision(&self) -> bool {
        self.labels.contains_key("gerrit-revision")
    }
}

/// A typed request to execute a named, pre-configured job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionRequest {
    pub job_name: String,
    pub execution_type: ExecutionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<GitRefs>,
    #[serde(default)]
    pub pod_spec_options: PodSpecOptions,
}

impl JobExecutionRequest {
    /// Enforce the §3 field invariants: PERIODIC must not carry refs;
    /// non-periodic requests must carry refs and those refs must validate;
    /// pod-spec overlays must validate.
    pub fn validate(&self) -> Result<(), GatewayError> {
        match (self.execution_type, &self.refs) {
            (ExecutionType::Periodic, Some(_)) => {
                return Err(GatewayError::InvalidArgument(
                    "PERIODIC requests must not carry refs".into(),
                ));
            }
            (ExecutionType::Periodic, None) => {}
            (_, None) => {
                return Err(GatewayError::InvalidArgument(
                    "non-periodic requests must carry refs".into(),
                ));
            }
            (_, Some(refs)) => refs.validate()?,
        }
        self.pod_spec_options.validate()?;
        Ok(())
    }

    /// PRESUBMIT additionally requires at least one pull (§4.3).
    pub fn validate_presubmit_has_pull(&self) -> Result<(), GatewayError> {
        let has_pull = self
            .refs
            .as_ref()
            .map(|r| !r.pulls.is_empty())
            .unwrap_or(false);
        if !has_pull {
            return Err(GatewayError::InvalidArgument(
                "presubmit requests require at least one pull".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::Pull;

    fn refs() -> GitRefs {
        GitRefs {
            org: "k".into(),
            repo: "r".into(),
            base_ref: "main".into(),
            base_sha: "a".repeat(40),
            clone_uri: None,
            pulls: vec![Pull {
                number: 1,
                author: String::new(),
                sha: "b".repeat(40),
                title: String::new(),
                link: String::new(),
            }],
        }
    }

    #[test]
    fn periodic_with_refs_is_rejected() {
        let req = JobExecutionRequest {
            job_name: "nightly".into(),
            execution_type: ExecutionType::Periodic,
            refs: Some(refs()),
            pod_spec_options: PodSpecOptions::default(),
        };
        assert!(matches!(
            req.validate(),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_periodic_without_refs_is_rejected() {
        let req = JobExecutionRequest {
            job_name: "unit".into(),
            execution_type: ExecutionType::Presubmit,
            refs: None,
            pod_spec_options: PodSpecOptions::default(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn valid_presubmit_passes() {
        let req = JobExecutionRequest {
            job_name: "unit".into(),
            execution_type: ExecutionType::Presubmit,
            refs: Some(refs()),
            pod_spec_options: PodSpecOptions::default(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn presubmit_without_pull_fails_the_pull_check() {
        let mut r = refs();
        r.pulls.clear();
        let req = JobExecutionRequest {
            job_name: "unit".into(),
            execution_type: ExecutionType::Presubmit,
            refs: Some(r),
            pod_spec_options: PodSpecOptions::default(),
        };
        assert!(req.validate().is_ok());
        assert!(req.validate_presubmit_has_pull().is_err());
    }

    #[test]
    fn empty_env_value_is_rejected() {
        let mut opts = PodSpecOptions::default();
        opts.envs.insert("KEY".into(), String::new());
        assert!(opts.validate().is_err());
    }
}
