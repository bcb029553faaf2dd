use thiserror::Error;

/// The error taxonomy shared by every gateway component.
///
/// Each variant maps to a disposition on the external surface it crosses:
/// gRPC status, HTTP status, or bus-redelivery signal. `CacheCorruption` is
/// the one variant that never reaches a caller — the cache heals itself and
/// the operation continues.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous match: {0}")]
    Ambiguous(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("cache slot held a value of the wrong shape: {0}")]
    CacheCorruption(String),

    #[error("transport authentication failed")]
    TransportAuth,

    #[error("bad cache key getter: {0}")]
    BadGetter(String),

    #[error("bad cache key: {0}")]
    BadKey(String),

    #[error("unsupported bus event type: {0}")]
    UnsupportedEventType(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// A short machine-stable tag, used for the `kind` label on error counters.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidArgument(_) => "invalid_argument",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Ambiguous(_) => "ambiguous",
            GatewayError::PermissionDenied(_) => "permission_denied",
            GatewayError::Upstream(_) => "upstream",
            GatewayError::CacheCorruption(_) => "cache_corruption",
            GatewayError::TransportAuth => "transport_auth",
            GatewayError::BadGetter(_) => "bad_getter",
            GatewayError::BadKey(_) => "bad_key",
            GatewayError::UnsupportedEventType(_) => "unsupported_event_type",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Whether this failure should be reported to the caller as a terminal
    /// `ERROR` job state (§7: PermissionDenied and Upstream are; validation
    /// failures that never produced a resource are not).
    pub fn reports_as_terminal_error(&self) -> bool {
        matches!(
            self,
            GatewayError::PermissionDenied(_) | GatewayError::Upstream(_)
        )
    }
}
