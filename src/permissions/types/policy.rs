use crate::schema::field_path::FieldSet;
use serde::{Deserialize, Serialize};

/// How an approved request combines with a grant's existing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// The grant's fields become exactly the request's fields. Anything
    /// approved earlier and not asked for again stops being shared.
    #[default]
    Replace,
    /// The request's fields are added to what the grant already shares.
    Union,
}

impl ApprovalPolicy {
    /// Field set the grant holds after approving `requested`.
    pub fn apply(&self, current: &FieldSet, requested: &FieldSet) -> FieldSet {
        match self {
            ApprovalPolicy::Replace => requested.clone(),
            ApprovalPolicy::Union => current.union(requested),
        }
    }
}
