//! Provider-agnostic request shapes for base commit lookups.

use serde::{Deserialize, Serialize};

/// What the base commit is being looked up for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseCommitQuery {
    /// A merge request, optionally pinned to one diff version.
    ///
    /// Without a `diff_id` the merge request's overall base is used.
    MergeRequest {
        merge_request_id: String,
        diff_id: Option<String>,
    },
    /// A single commit; its base is the first parent.
    Commit { commit_id: String },
}

impl BaseCommitQuery {
    pub fn merge_request(merge_request_id: impl Into<String>, diff_id: Option<String>) -> Self {
        Self::MergeRequest {
            merge_request_id: merge_request_id.into(),
            diff_id,
        }
    }

    pub fn commit(commit_id: impl Into<String>) -> Self {
        Self::Commit {
            commit_id: commit_id.into(),
        }
    }
}
