use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

/// Fields common to all three execution-types: a unique name, a
/// branch-match predicate, default labels/annotations, the target cluster,
/// an opaque pod template, and the owning tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDefinitionCommon {
    pub name: String,
    /// Branches this job runs against. Empty matches any branch.
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub cluster: String,
    #[serde(default)]
    pub tenant_id: String,
    /// Opaque to this workspace — handed untouched to the orchestration
    /// cluster API by `gateway-creator`.
    #[serde(default)]
    pub pod_template: serde_json::Value,
}

impl JobDefinitionCommon {
    /// True iff this job's branch predicate accepts `base_ref`: an empty
    /// list matches any branch, otherwise `base_ref` must appear verbatim.
    pub fn matches_branch(&self, base_ref: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == base_ref)
    }
}

macro_rules! definition_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub JobDefinitionCommon);

        impl Deref for $name {
            type Target = JobDefinitionCommon;
            fn deref(&self) -> &JobDefinitionCommon {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut JobDefinitionCommon {
                &mut self.0
            }
        }
    };
}

definition_newtype!(PeriodicDefinition, "A time-triggered job definition.");
definition_newtype!(
    PresubmitDefinition,
    "A before-merge job definition, scoped to one repository."
);
definition_newtype!(
    PostsubmitDefinition,
    "An after-merge job definition, scoped to one repository."
);

/// A homogeneous handle over the three job-definition variants, used where
/// callers need to treat them uniformly (e.g. logging, metrics labeling).
/// Resolution itself dispatches on [`crate::request::ExecutionType`], not on
/// this enum — see `gateway-resolver`'s closed three-way match.
#[derive(Debug, Clone, PartialEq)]
pub enum JobDefinition {
    Periodic(PeriodicDefinition),
    Presubmit(PresubmitDefinition),
    Postsubmit(PostsubmitDefinition),
}

impl JobDefinition {
    pub fn common(&self) -> &JobDefinitionCommon {
        match self {
            JobDefinition::Periodic(d) => d,
            JobDefinition::Presubmit(d) => d,
            JobDefinition::Postsubmit(d) => d,
        }
    }
}
