//! `Admission` (C4): request validation, tenant authorization, cluster
//! allow-listing, and the security-level filter used on the external
//! integration path.

use gateway_config::ConfigCatalog;
use gateway_types::{
    AllowedClient, GatewayError, IssueContext, JobExecutionRequest, JobSpec,
};

/// `validateRequest` — enforces the §3 field invariants. Delegates to
/// [`JobExecutionRequest::validate`]; kept as its own entry point so the
/// gRPC/bus/HTTP adapters have a single admission surface to call.
pub fn validate_request(req: &JobExecutionRequest) -> Result<(), GatewayError> {
    req.validate()
}

/// `authorizeClient(client, jobSpec) -> bool`, generalized to surface the
/// "no tenant" failure explicitly rather than collapsing it into `false`.
///
/// True iff some filter on `client` has `tenant_id == job_spec.tenant_id`.
/// If the job spec's tenant is empty, falls back to the catalog default for
/// `(org_repo, "*")`; if that is also empty, fails with `InvalidArgument`.
pub fn authorize_client(
    catalog: &ConfigCatalog,
    client: &AllowedClient,
    job_spec: &JobSpec,
    org_repo: Option<&str>,
) -> Result<bool, GatewayError> {
    let tenant_id = if job_spec.tenant_id.is_empty() {
        let org_repo = org_repo.unwrap_or("*");
        let fallback = catalog
            .defaults_for(org_repo, "*")
            .map(|d| d.tenant_id)
            .unwrap_or_default();
        if fallback.is_empty() {
            return Err(GatewayError::InvalidArgument("no tenant".into()));
        }
        fallback
    } else {
        job_spec.tenant_id.clone()
    };

    Ok(client.authorized_for_tenant(&tenant_id))
}

/// `clusterAllowed(cluster, allowedList) -> bool`: true iff `allowed_list`
/// contains `"*"` or an exact match.
pub fn cluster_allowed(cluster: &str, allowed_list: &[String]) -> bool {
    allowed_list.iter().any(|c| c == "*" || c == cluster)
}

/// `securityLevelAllowed(issue, allowedLevels)`, applied only on the
/// external-integration path (§4.4). An empty allow-list passes everything.
pub fn security_level_allowed(issue: &IssueContext, allowed_levels: &[String]) -> bool {
    allowed_levels.is_empty() || allowed_levels.contains(&issue.security_level)
}
