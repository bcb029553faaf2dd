use std::fmt;

use crate::error::GatewayError;

/// `(repo-identifier, base-sha, ordered list of head-shas)` — the key into
/// both presubmit and postsubmit repo-config caches. Order-sensitive:
/// `[a, b]` and `[b, a]` are different keys, matching the stringified form
/// `identifier:<id>,baseSHA:<b>[,headSHA:<h>]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identifier: String,
    base_sha: String,
    head_shas: Vec<String>,
}

impl CacheKey {
    /// Build a key from already-resolved getter outputs. Propagates an
    /// empty identifier as `BadKey` (§4.2, §8).
    pub fn new(
        identifier: impl Into<String>,
        base_sha: impl Into<String>,
        head_shas: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, GatewayError> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(GatewayError::BadKey(
                "cache key identifier must be non-empty".into(),
            ));
        }
        Ok(Self {
            identifier,
            base_sha: base_sha.into(),
            head_shas: head_shas.into_iter().map(Into::into).collect(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identifier:{},baseSHA:{}", self.identifier, self.base_sha)?;
        for head in &self.head_shas {
            write!(f, ",headSHA:{head}")?;
        }
        Ok(())
    }
}
