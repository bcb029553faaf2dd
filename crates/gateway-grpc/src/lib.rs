//! `GrpcTrigger` (C6): a synchronous RPC surface over the same
//! validate → identify → resolve → authorize → create pipeline used by the
//! bus triggers (§4.6).

use std::collections::BTreeMap;
use std::sync::Arc;

use gateway_admission::{authorize_client, cluster_allowed, validate_request};
use gateway_config::ConfigCatalog;
use gateway_creator::{create, CreationFailureReporter, JobStore};
use gateway_repo_cache::RepoConfigCache;
use gateway_resolver::resolve;
use gateway_types::error::GatewayError;
use gateway_types::refs::{GitRefs, Pull};
use gateway_types::request::{ExecutionType, JobExecutionRequest, PodSpecOptions};
use tonic::{Request, Response, Status};

pub mod proto {
    tonic::include_proto!("gateway.v1");
}

use proto::job_execution_gateway_server::JobExecutionGateway;
pub use proto::job_execution_gateway_server::JobExecutionGatewayServer;

/// Metadata key the trigger surface reads the caller's identity from,
/// handed to `ConfigCatalog::identify_client` (§4.6).
pub const IDENTITY_METADATA_KEY: &str = "x-gateway-client-identity";

/// Wires the gRPC transport onto the shared gateway components. Built once
/// per process and registered with a `tonic::transport::Server` by the
/// binary crate.
pub struct GatewayService {
    catalog: Arc<ConfigCatalog>,
    cache: Option<Arc<RepoConfigCache>>,
    store: Arc<dyn JobStore>,
    failure_reporter: Option<Arc<dyn CreationFailureReporter>>,
}

impl GatewayService {
    pub fn new(
        catalog: Arc<ConfigCatalog>,
        cache: Option<Arc<RepoConfigCache>>,
        store: Arc<dyn JobStore>,
        failure_reporter: Option<Arc<dyn CreationFailureReporter>>,
    ) -> Self {
        Self {
            catalog,
            cache,
            store,
            failure_reporter,
        }
    }
}

fn extract_identity<T>(request: &Request<T>) -> Result<String, Status> {
    request
        .metadata()
        .get(IDENTITY_METADATA_KEY)
        .ok_or_else(|| Status::permission_denied("missing client identity metadata"))?
        .to_str()
        .map(str::to_string)
        .map_err(|_| Status::permission_denied("client identity metadata is not valid ASCII"))
}

fn to_execution_type(value: i32) -> Result<ExecutionType, Status> {
    match proto::JobExecutionType::try_from(value) {
        Ok(proto::JobExecutionType::Periodic) => Ok(ExecutionType::Periodic),
        Ok(proto::JobExecutionType::Presubmit) => Ok(ExecutionType::Presubmit),
        Ok(proto::JobExecutionType::Postsubmit) => Ok(ExecutionType::Postsubmit),
        _ => Err(Status::invalid_argument("unspecified job execution type")),
    }
}

fn from_proto_refs(refs: proto::GitRefs) -> GitRefs {
    GitRefs {
        org: refs.org,
        repo: refs.repo,
        base_ref: refs.base_ref,
        base_sha: refs.base_sha,
        clone_uri: (!refs.clone_uri.is_empty()).then_some(refs.clone_uri),
        pulls: refs
            .pulls
            .into_iter()
            .map(|p| Pull {
                number: p.number,
                author: p.author,
                sha: p.sha,
                title: p.title,
                link: p.link,
            })
            .collect(),
    }
}

fn from_proto_pod_spec_options(options: Option<proto::PodSpecOptions>) -> PodSpecOptions {
    match options {
        Some(o) => PodSpecOptions {
            envs: o.envs.into_iter().collect::<BTreeMap<_, _>>(),
            labels: o.labels.into_iter().collect::<BTreeMap<_, _>>(),
            annotations: o.annotations.into_iter().collect::<BTreeMap<_, _>>(),
        },
        None => PodSpecOptions::default(),
    }
}

fn from_proto_request(req: proto::CreateJobExecutionRequest) -> Result<JobExecutionRequest, Status> {
    Ok(JobExecutionRequest {
        job_name: req.job_name,
        execution_type: to_execution_type(req.job_execution_type)?,
        refs: req.refs.map(from_proto_refs),
        pod_spec_options: from_proto_pod_spec_options(req.pod_spec_options),
    })
}

fn to_proto_status(state: Option<gateway_types::resource::JobState>) -> proto::JobExecutionStatus {
    use gateway_types::resource::JobState;
    match state {
        Some(JobState::Triggered) => proto::JobExecutionStatus::Triggered,
        Some(JobState::Pending) => proto::JobExecutionStatus::Pending,
        Some(JobState::Success) => proto::JobExecutionStatus::Success,
        Some(JobState::Failure) => proto::JobExecutionStatus::Failure,
        Some(JobState::Aborted) => proto::JobExecutionStatus::Aborted,
        Some(JobState::Error) => proto::JobExecutionStatus::Error,
        None => proto::JobExecutionStatus::Unspecified,
    }
}

/// Map the shared error taxonomy onto the four gRPC codes this surface is
/// documented to emit (§6): `INVALID_ARGUMENT`, `PERMISSION_DENIED`,
/// `NOT_FOUND`, `INTERNAL`. `Ambiguous` collapses into `NOT_FOUND` — gRPC has
/// no distinct code for it, and from the caller's perspective both mean "no
/// single job resolved."
fn to_status(error: GatewayError) -> Status {
    match error {
        GatewayError::InvalidArgument(msg) => Status::invalid_argument(msg),
        GatewayError::NotFound(msg) => Status::not_found(msg),
        GatewayError::Ambiguous(msg) => Status::not_found(msg),
        GatewayError::PermissionDenied(msg) => Status::permission_denied(msg),
        other => Status::internal(other.to_string()),
    }
}

#[tonic::async_trait]
impl JobExecutionGateway for GatewayService {
    #[tracing::instrument(skip_all, err)]
    async fn create_job_execution(
        &self,
        request: Request<proto::CreateJobExecutionRequest>,
    ) -> Result<Response<proto::JobExecution>, Status> {
        let identity = extract_identity(&request)?;
        let domain_request = from_proto_request(request.into_inner())?;
        tracing::debug!(job_name = %domain_request.job_name, %identity, "received create_job_execution request");

        validate_request(&domain_request).map_err(to_status)?;
        if domain_request.execution_type == ExecutionType::Presubmit {
            domain_request
                .validate_presubmit_has_pull()
                .map_err(to_status)?;
        }

        let client = self
            .catalog
            .identify_client(&identity)
            .ok_or_else(|| Status::permission_denied("unknown client identity"))?;

        let resolved = resolve(&self.catalog, self.cache.as_deref(), &domain_request).map_err(to_status)?;

        let org_repo = domain_request.refs.as_ref().map(GitRefs::org_repo);
        let authorized =
            authorize_client(&self.catalog, &client, &resolved.spec, org_repo.as_deref())
                .map_err(to_status)?;
        if !authorized {
            let error = GatewayError::PermissionDenied(format!(
                "client {} not authorized for tenant {}",
                client.identity, resolved.spec.tenant_id
            ));
            gateway_creator::report_rejection(
                self.failure_reporter.as_deref(),
                &resolved.spec,
                &resolved.labels,
                &resolved.annotations,
                &error,
            );
            return Err(to_status(error));
        }

        let allowed_clusters = self.catalog.allowed_clusters();
        if !cluster_allowed(&resolved.spec.cluster, &allowed_clusters) {
            let error = GatewayError::PermissionDenied(format!(
                "cluster {} is not in the allowed list",
                resolved.spec.cluster
            ));
            gateway_creator::report_rejection(
                self.failure_reporter.as_deref(),
                &resolved.spec,
                &resolved.labels,
                &resolved.annotations,
                &error,
            );
            return Err(to_status(error));
        }

        let mut labels = resolved.labels;
        labels.extend(domain_request.pod_spec_options.labels.clone());
        let mut annotations = resolved.annotations;
        annotations.extend(domain_request.pod_spec_options.annotations.clone());

        let resource = create(
            self.store.as_ref(),
            self.failure_reporter.as_deref(),
            resolved.spec,
            labels,
            annotations,
            domain_request.pod_spec_options.envs,
        )
        .map_err(to_status)?;

        Ok(Response::new(proto::JobExecution {
            id: resource.id,
            status: to_proto_status(resource.status.state) as i32,
        }))
    }
}
