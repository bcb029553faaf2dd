use serde::{Deserialize, Serialize};

/// One authorization filter on an `AllowedClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub tenant_id: String,
}

/// An identity allowed to call the gRPC/bus trigger surface, plus the set
/// of tenants it may trigger jobs for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedClient {
    pub identity: String,
    #[serde(default)]
    pub filters: Vec<JobFilter>,
}

impl AllowedClient {
    /// A client is authorized for a job iff any of its filters' tenant-id
    /// equals the job's tenant-id (§4.4).
    pub fn authorized_for_tenant(&self, tenant_id: &str) -> bool {
        self.filters.iter().any(|f| f.tenant_id == tenant_id)
    }
}

/// The subset of an externally-sourced issue (e.g. a review-comment
/// webhook) relevant to `securityLevelAllowed` (§4.4). The webhook adapter
/// itself is out of scope; only this contract is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContext {
    pub security_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorized_iff_some_filter_matches_tenant() {
        let client = AllowedClient {
            identity: "ci-bot".into(),
            filters: vec![JobFilter {
                tenant_id: "platform".into(),
            }],
        };
        assert!(client.authorized_for_tenant("platform"));
        assert!(!client.authorized_for_tenant("other"));
    }

    #[test]
    fn client_with_no_filters_authorizes_nothing() {
        let client = AllowedClient {
            identity: "ci-bot".into(),
            filters: vec![],
        };
        assert!(!client.authorized_for_tenant("platform"));
    }
}
