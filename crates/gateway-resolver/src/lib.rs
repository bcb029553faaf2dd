//! `Resolver` (C3): turns a typed [`JobExecutionRequest`] into a concrete
//! [`JobSpec`] by combining the static [`ConfigCatalog`] with, for
//! non-periodic requests, the in-repo [`RepoConfigCache`].
//!
//! Dispatch is a closed three-way match on [`ExecutionType`] in one place
//! (`resolve`) rather than an open hierarchy of resolver types (§9).

use std::collections::BTreeMap;

use gateway_config::ConfigCatalog;
use gateway_repo_cache::RepoConfigCache;
use gateway_types::job::JobDefinitionCommon;
use gateway_types::{ExecutionType, GatewayError, GitRefs, JobExecutionRequest, JobSpec};

/// The definition's labels/annotations, returned unchanged for later
/// merging with the request's own overlay (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJob {
    pub spec: JobSpec,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

/// `resolve(cfg, cache, request) -> (jobSpec, labels, annotations) | FAIL`.
pub fn resolve(
    catalog: &ConfigCatalog,
    cache: Option<&RepoConfigCache>,
    request: &JobExecutionRequest,
) -> Result<ResolvedJob, GatewayError> {
    match request.execution_type {
        ExecutionType::Periodic => resolve_periodic(catalog, request),
        ExecutionType::Presubmit => resolve_presubmit(catalog, cache, request),
        ExecutionType::Postsubmit => resolve_postsubmit(catalog, cache, request),
    }
}

fn resolve_periodic(
    catalog: &ConfigCatalog,
    request: &JobExecutionRequest,
) -> Result<ResolvedJob, GatewayError> {
    let periodics = catalog.all_periodics();
    let matched = periodics
        .iter()
        .find(|p| p.name == request.job_name)
        .ok_or_else(|| GatewayError::NotFound(format!("no periodic named {:?}", request.job_name)))?;

    Ok(build_resolved(&matched.0, None))
}

fn resolve_presubmit(
    catalog: &ConfigCatalog,
    cache: Option<&RepoConfigCache>,
    request: &JobExecutionRequest,
) -> Result<ResolvedJob, GatewayError> {
    request.validate_presubmit_has_pull()?;
    let refs = request
        .refs
        .as_ref()
        .ok_or_else(|| GatewayError::InvalidArgument("presubmit requests require refs".into()))?;
    refs.validate()?;

    let mut refs = refs.clone();
    let mut org_repo = refs.org_repo();
    if request.pod_spec_options.is_gerrit_revision() && !org_repo.starts_with("https://") {
        refs.apply_gerrit_https_prefix();
        org_repo = format!("https://{org_repo}");
    }

    let static_jobs = catalog.presubmits_for(&org_repo);

    let candidates = match cache {
        Some(cache) => {
            let base_sha = refs.base_sha.clone();
            let head_shas: Vec<String> = refs.pull_head_shas().into_iter().map(String::from).collect();
            let base_getter: &dyn Fn() -> Result<String, GatewayError> = &|| Ok(base_sha.clone());
            let head_getters: Vec<Box<dyn Fn() -> Result<String, GatewayError>>> = head_shas
                .iter()
                .map(|sha| {
                    let sha = sha.clone();
                    Box::new(move || Ok(sha.clone())) as Box<dyn Fn() -> Result<String, GatewayError>>
                })
                .collect();
            match cache.get_presubmits(&org_repo, base_getter, &head_getters, &static_jobs) {
                Ok(outcome) => outcome.jobs,
                Err(e) => {
                    tracing::warn!(error = %e, org_repo, "in-repo presubmit fetch failed, falling back to static list");
                    static_jobs
                }
            }
        }
        None => static_jobs,
    };

    let matched = select_by_branch_and_name(&candidates, &refs.base_ref, &request.job_name)?;
    Ok(build_resolved(matched, Some(&refs)))
}

fn resolve_postsubmit(
    catalog: &ConfigCatalog,
    cache: Option<&RepoConfigCache>,
    request: &JobExecutionRequest,
) -> Result<ResolvedJob, GatewayError> {
    let refs = request
        .refs
        .as_ref()
        .ok_or_else(|| GatewayError::InvalidArgument("postsubmit requests require refs".into()))?;
    refs.validate()?;

    let mut refs = refs.clone();
    let mut org_repo = refs.org_repo();
    if request.pod_spec_options.is_gerrit_revision() && !org_repo.starts_with("https://") {
        refs.apply_gerrit_https_prefix();
        org_repo = format!("https://{org_repo}");
    }

    let static_jobs = catalog.postsubmits_for(&org_repo);

    let candidates = match cache {
        Some(cache) => {
            let base_sha = refs.base_sha.clone();
            let base_getter: &dyn Fn() -> Result<String, GatewayError> = &|| Ok(base_sha.clone());
            match cache.get_postsubmits(&org_repo, base_getter, &static_jobs) {
                Ok(outcome) => outcome.jobs,
                Err(e) => {
                    tracing::warn!(error = %e, org_repo, "in-repo postsubmit fetch failed, falling back to static list");
                    static_jobs
                }
            }
        }
        None => static_jobs,
    };

    let matched = select_by_branch_and_name(&candidates, &refs.base_ref, &request.job_name)?;
    Ok(build_resolved(matched, Some(&refs)))
}

/// Shared tail of the presubmit/postsubmit algorithms: filter by branch
/// match, then scan for `name == job_name`; `Ambiguous` on >1 match,
/// `NotFound` on zero.
fn select_by_branch_and_name<'a, T>(
    candidates: &'a [T],
    base_ref: &str,
    job_name: &str,
) -> Result<&'a JobDefinitionCommon, GatewayError>
where
    T: std::ops::Deref<Target = JobDefinitionCommon>,
{
    let matches: Vec<&JobDefinitionCommon> = candidates
        .iter()
        .map(|c| c.deref())
        .filter(|c| c.matches_branch(base_ref))
        .filter(|c| c.name == job_name)
        .collect();

    match matches.len() {
        0 => Err(GatewayError::NotFound(format!(
            "no job named {job_name:?} matches branch {base_ref:?}"
        ))),
        1 => Ok(matches[0]),
        _ => Err(GatewayError::Ambiguous(format!(
            "{} jobs named {job_name:?} match branch {base_ref:?}",
            matches.len()
        ))),
    }
}

fn build_resolved(def: &JobDefinitionCommon, refs: Option<&GitRefs>) -> ResolvedJob {
    ResolvedJob {
        spec: JobSpec {
            job_name: def.name.clone(),
            cluster: def.cluster.clone(),
            tenant_id: def.tenant_id.clone(),
            pod_template: def.pod_template.clone(),
            refs: refs.cloned(),
        },
        labels: def.labels.clone(),
        annotations: def.annotations.clone(),
    }
}
