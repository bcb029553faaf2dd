use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A single pull request head to be merged into `GitRefs::base_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pull {
    pub number: u32,
    #[serde(default)]
    pub author: String,
    pub sha: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
}

/// A git-refs tuple: a base branch plus zero or more pull-request heads to
/// be merged into it. Immutable after construction — nothing downstream of
/// [`JobExecutionRequest`](crate::request::JobExecutionRequest) mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRefs {
    pub org: String,
    pub repo: String,
    pub base_ref: String,
    pub base_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_uri: Option<String>,
    #[serde(default)]
    pub pulls: Vec<Pull>,
}

fn is_forty_hex(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

impl GitRefs {
    /// `org/repo`, the lookup key for `presubmitsFor`/`postsubmitsFor`.
    pub fn org_repo(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }

    /// Head SHAs of every pull, in order — the getters passed to
    /// `RepoConfigCache::get_presubmits`.
    pub fn pull_head_shas(&self) -> Vec<&str> {
        self.pulls.iter().map(|p| p.sha.as_str()).collect()
    }

    /// Validate the §3 field invariants: org, repo, base-ref, base-sha all
    /// non-empty, and every pull's sha matches `^[0-9a-f]{40}$`.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.org.is_empty() || self.repo.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "refs.org and refs.repo must be non-empty".into(),
            ));
        }
        if self.base_ref.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "refs.base_ref must be non-empty".into(),
            ));
        }
        if self.base_sha.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "refs.base_sha must be non-empty".into(),
            ));
        }
        for pull in &self.pulls {
            if !is_forty_hex(&pull.sha) {
                return Err(GatewayError::InvalidArgument(format!(
                    "pull #{} sha {:?} is not a 40-character lowercase hex string",
                    pull.number, pull.sha
                )));
            }
        }
        Ok(())
    }

    /// Prepend `https://` to `org` when it does not already carry a scheme.
    /// Applied when the request carries the `gerrit-revision` label (§4.3, §4.7).
    pub fn apply_gerrit_https_prefix(&mut self) {
        if !self.org.starts_with("https://") {
            self.org = format!("https://{}", self.org);
        }
    }

    /// Identity conversion to the wire representation used in bus/report
    /// payloads. `GitRefs` already is that representation; this exists so
    /// the round-trip law (`refs_from_wire(refs_to_wire(x)) == x`) has a
    /// concrete pair of functions to hold over, rather than being vacuous.
    pub fn to_wire(&self) -> GitRefs {
        self.clone()
    }

    /// Inverse of [`GitRefs::to_wire`].
    pub fn from_wire(wire: GitRefs) -> GitRefs {
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_refs() -> GitRefs {
        GitRefs {
            org: "k".into(),
            repo: "r".into(),
            base_ref: "main".into(),
            base_sha: "a".repeat(40),
            clone_uri: None,
            pulls: vec![Pull {
                number: 7,
                author: "alice".into(),
                sha: "b".repeat(40),
                title: "fix".into(),
                link: "https://example.com/7".into(),
            }],
        }
    }

    #[test]
    fn validates_well_formed_refs() {
        assert!(valid_refs().validate().is_ok());
    }

    #[test]
    fn rejects_empty_org_or_repo() {
        let mut refs = valid_refs();
        refs.org = String::new();
        assert!(matches!(
            refs.validate(),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_non_hex_pull_sha() {
        let mut refs = valid_refs();
        refs.pulls[0].sha = "not-a-sha".into();
        assert!(refs.validate().is_err());
    }

    #[test]
    fn rejects_uppercase_or_short_sha() {
        let mut refs = valid_refs();
        refs.pulls[0].sha = "B".repeat(40);
        assert!(refs.validate().is_err());

        let mut refs = valid_refs();
        refs.pulls[0].sha = "b".repeat(39);
        assert!(refs.validate().is_err());
    }

    #[test]
    fn org_repo_joins_with_slash() {
        assert_eq!(valid_refs().org_repo(), "k/r");
    }

    #[test]
    fn gerrit_prefix_is_idempotent() {
        let mut refs = valid_refs();
        refs.apply_gerrit_https_prefix();
        assert_eq!(refs.org, "https://k");
        refs.apply_gerrit_https_prefix();
        assert_eq!(refs.org, "https://k");
    }

    #[test]
    fn wire_round_trip_preserves_pull_order() {
        let refs = valid_refs();
        assert_eq!(GitRefs::from_wire(refs.to_wire()), refs);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip_holds_for_arbitrary_well_formed_refs(
                org in "[a-z]{1,10}",
                repo in "[a-z]{1,10}",
                base_ref in "[a-z/]{1,10}",
                base_sha in "[0-9a-f]{40}",
                pull_count in 0usize..4,
            ) {
                let pulls = (0..pull_count)
                    .map(|i| Pull {
                        number: i as u32,
                        author: "a".into(),
                        sha: "c".repeat(40),
                        title: "t".into(),
                        link: "l".into(),
                    })
                    .collect();
                let refs = GitRefs { org, repo, base_ref, base_sha, clone_uri: None, pulls };
                prop_assert_eq!(GitRefs::from_wire(refs.to_wire()), refs);
            }
        }
    }
}
