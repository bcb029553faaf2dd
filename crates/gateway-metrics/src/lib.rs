//! `Metrics` (C9): the Prometheus registry shared by every trigger surface.
//!
//! No `/metrics` HTTP exposition server lives here — that outer surface is
//! out of scope (§1) and left to the binary embedding this crate. This
//! crate only owns the counters/histograms themselves and the registry
//! they're bound to.

use gateway_types::error::GatewayError;
use prometheus::{HistogramVec, IntCounterVec, Registry};

/// One instance per process. Cheap to clone (`prometheus` metric handles
/// are themselves `Arc`-backed).
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    errors_total: IntCounterVec,
    resolve_duration_seconds: HistogramVec,
    reports_published_total: IntCounterVec,
}

/// Which trigger surface accepted the request — the `surface` label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Grpc,
    Push,
    Pull,
}

impl Surface {
    fn as_str(self) -> &'static str {
        match self {
            Surface::Grpc => "grpc",
            Surface::Push => "push",
            Surface::Pull => "pull",
        }
    }
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, GatewayError> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            prometheus::Opts::new(
                "gateway_requests_total",
                "Job execution requests accepted per trigger surface and execution type",
            ),
            &["surface", "execution_type"],
        )
        .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;

        let errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "gateway_errors_total",
                "Job execution requests rejected, by error kind",
            ),
            &["surface", "kind"],
        )
        .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;

        let resolve_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "gateway_resolve_duration_seconds",
                "Time spent resolving a job execution request into a job spec",
            ),
            &["execution_type"],
        )
        .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;

        let reports_published_total = IntCounterVec::new(
            prometheus::Opts::new(
                "gateway_reports_published_total",
                "Terminal-state reports published to the completion bus",
            ),
            &["outcome"],
        )
        .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;
        registry
            .register(Box::new(errors_total.clone()))
            .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;
        registry
            .register(Box::new(resolve_duration_seconds.clone()))
            .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;
        registry
            .register(Box::new(reports_published_total.clone()))
            .map_err(|e| GatewayError::Internal(format!("metric registration failed: {e}")))?;

        tracing::debug!("metrics registry initialized");

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            resolve_duration_seconds,
            reports_published_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_request(&self, surface: Surface, execution_type: &str) {
        self.requests_total
            .with_label_values(&[surface.as_str(), execution_type])
            .inc();
    }

    pub fn record_error(&self, surface: Surface, error: &GatewayError) {
        self.errors_total
            .with_label_values(&[surface.as_str(), error.kind()])
            .inc();
    }

    pub fn observe_resolve_duration(&self, execution_type: &str, seconds: f64) {
        self.resolve_duration_seconds
            .with_label_values(&[execution_type])
            .observe(seconds);
    }

    pub fn record_report_published(&self, outcome: &str) {
        self.reports_published_total
            .with_label_values(&[outcome])
            .inc();
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new().expect("static metric descriptors are always valid")
    }
}
