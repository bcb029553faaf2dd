//! Wires the gateway's components (C1-C9) into one running service and
//! implements [`gateway_bus::Pipeline`] for the bus trigger paths (§4.7):
//! `validateRequest → resolve → clusterAllowed → create`. The gRPC path
//! (§4.6, `gateway-grpc::GatewayService`) additionally identifies and
//! authorizes the caller; the bus is a trusted internal channel and skips
//! that step.

use std::sync::Arc;

use gateway_admission::{cluster_allowed, validate_request};
use gateway_bus::Pipeline;
use gateway_config::ConfigCatalog;
use gateway_creator::{create, CreationFailureReporter, JobStore};
use gateway_metrics::{GatewayMetrics, Surface};
use gateway_repo_cache::RepoConfigCache;
use gateway_resolver::resolve;
use gateway_types::error::GatewayError;
use gateway_types::request::JobExecutionRequest;

/// The assembled set of collaborators a running gateway process needs.
/// Construction is the binary crate's job; this struct only owns the
/// dispatch logic shared by push and pull.
pub struct Gateway {
    catalog: Arc<ConfigCatalog>,
    cache: Option<Arc<RepoConfigCache>>,
    store: Arc<dyn JobStore>,
    failure_reporter: Option<Arc<dyn CreationFailureReporter>>,
    metrics: Arc<GatewayMetrics>,
}

impl Gateway {
    pub fn new(
        catalog: Arc<ConfigCatalog>,
        cache: Option<Arc<RepoConfigCache>>,
        store: Arc<dyn JobStore>,
        failure_reporter: Option<Arc<dyn CreationFailureReporter>>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            catalog,
            cache,
            store,
            failure_reporter,
            metrics,
        }
    }

    pub fn catalog(&self) -> &Arc<ConfigCatalog> {
        &self.catalog
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Build the gRPC service for this gateway's collaborators (§4.6).
    /// The returned server is ready to register with a
    /// `tonic::transport::Server`; building and running that server is the
    /// binary crate's job.
    pub fn grpc_service(&self) -> gateway_grpc::JobExecutionGatewayServer<gateway_grpc::GatewayService> {
        gateway_grpc::JobExecutionGatewayServer::new(gateway_grpc::GatewayService::new(
            self.catalog.clone(),
            self.cache.clone(),
            self.store.clone(),
            self.failure_reporter.clone(),
        ))
    }

    /// Build the push-mode HTTP router for this gateway (§4.7), dispatching
    /// through `self` as the bus [`Pipeline`]. Requires `self` already be
    /// held in an `Arc`, since the router keeps its own clone alive for the
    /// lifetime of the server.
    pub fn push_router(self: &Arc<Self>) -> axum::Router {
        gateway_bus::push_router(self.catalog.clone(), self.clone() as Arc<dyn Pipeline>)
    }
}

#[async_trait::async_trait]
impl Pipeline for Gateway {
    #[tracing::instrument(skip_all, fields(job_name = %request.job_name, execution_type = ?request.execution_type))]
    async fn dispatch(&self, request: JobExecutionRequest) -> Result<(), GatewayError> {
        let surface = Surface::Pull;
        let execution_type_label = execution_type_label(request.execution_type);
        self.metrics.record_request(surface, execution_type_label);

        let outcome = dispatch_inner(
            &self.catalog,
            self.cache.as_deref(),
            self.store.as_ref(),
            self.failure_reporter.as_deref(),
            request,
        );

        if let Err(e) = &outcome {
            self.metrics.record_error(surface, e);
            tracing::warn!(error = %e, "dispatch rejected request");
        }

        outcome
    }
}

fn execution_type_label(execution_type: gateway_types::request::ExecutionType) -> &'static str {
    match execution_type {
        gateway_types::request::ExecutionType::Periodic => "periodic",
        gateway_types::request::ExecutionType::Presubmit => "presubmit",
        gateway_types::request::ExecutionType::Postsubmit => "postsubmit",
    }
}

fn dispatch_inner(
    catalog: &ConfigCatalog,
    cache: Option<&RepoConfigCache>,
    store: &dyn JobStore,
    failure_reporter: Option<&dyn CreationFailureReporter>,
    request: JobExecutionRequest,
) -> Result<(), GatewayError> {
    validate_request(&request)?;

    let resolved = resolve(catalog, cache, &request)?;

    let allowed_clusters = catalog.allowed_clusters();
    if !cluster_allowed(&resolved.spec.cluster, &allowed_clusters) {
        let error = GatewayError::PermissionDenied(format!(
            "cluster {} is not in the allowed list",
            resolved.spec.cluster
        ));
        gateway_creator::report_rejection(
            failure_reporter,
            &resolved.spec,
            &resolved.labels,
            &resolved.annotations,
            &error,
        );
        return Err(error);
    }

    let mut labels = resolved.labels;
    labels.extend(request.pod_spec_options.labels.clone());
    let mut annotations = resolved.annotations;
    annotations.extend(request.pod_spec_options.annotations.clone());

    create(
        store,
        failure_reporter,
        resolved.spec,
        labels,
        annotations,
        request.pod_spec_options.envs,
    )?;

    Ok(())
}
