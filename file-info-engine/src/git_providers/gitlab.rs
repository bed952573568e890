//! GitLab provider (REST v4) for base commit lookups.
//!
//! Endpoints used (as of 2025):
//!   * GET /projects/:id/merge_requests/:iid
//!   * GET /projects/:id/merge_requests/:iid/versions/:version_id
//!   * GET /projects/:id/repository/commits/:sha

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::ProviderError;
use crate::git_providers::{BaseCommitLookup, BaseCommitQuery};

/// GitLab HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String,      // e.g. "https://gitlab.com/api/v4"
    token: Option<String>, // "PRIVATE-TOKEN"
}

impl GitLabClient {
    /// Constructs a GitLab client with a shared HTTP instance and optional token.
    ///
    /// Without a token only public projects can be queried.
    pub fn new(http: Client, base_api: String, token: Option<String>) -> Self {
        debug!("Creating GitLabClient with base_api={}", base_api);
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn project_url(&self, owner: &str, repository_name: &str) -> String {
        let project = format!("{owner}/{repository_name}");
        format!("{}/projects/{}", self.base_api, urlencoding::encode(&project))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ProviderError> {
        let mut req = self.http.get(url);
        if let Some(token) = &self.token {
            req = req.header("PRIVATE-TOKEN", token);
        }

        let resp = req.send().await?.error_for_status()?.json().await?;
        Ok(resp)
    }

    /// Base commit of one diff version of a merge request.
    async fn get_version_base(
        &self,
        owner: &str,
        repository_name: &str,
        merge_request_id: &str,
        diff_id: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/merge_requests/{}/versions/{}",
            self.project_url(owner, repository_name),
            urlencoding::encode(merge_request_id),
            urlencoding::encode(diff_id),
        );
        debug!("GitLab get_version_base: {}", url);

        let version: GitLabMrVersion = self.get_json(url).await?;
        non_empty_sha(version.base_commit_sha, "base_commit_sha")
    }

    /// Overall base commit of a merge request.
    async fn get_mr_base(
        &self,
        owner: &str,
        repository_name: &str,
        merge_request_id: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/merge_requests/{}",
            self.project_url(owner, repository_name),
            urlencoding::encode(merge_request_id),
        );
        debug!("GitLab get_mr_base: {}", url);

        let mr: GitLabMr = self.get_json(url).await?;
        let refs = mr.diff_refs.ok_or_else(|| {
            ProviderError::InvalidResponse("merge request has no diff_refs".into())
        })?;
        non_empty_sha(refs.base_sha, "diff_refs.base_sha")
    }

    /// First parent of a commit.
    async fn get_commit_parent(
        &self,
        owner: &str,
        repository_name: &str,
        commit_id: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/repository/commits/{}",
            self.project_url(owner, repository_name),
            urlencoding::encode(commit_id),
        );
        debug!("GitLab get_commit_parent: {}", url);

        let commit: GitLabCommit = self.get_json(url).await?;
        first_parent(commit)
    }
}

impl BaseCommitLookup for GitLabClient {
    async fn base_commit_id(
        &self,
        owner: &str,
        repository_name: &str,
        query: &BaseCommitQuery,
    ) -> Result<String, ProviderError> {
        match query {
            BaseCommitQuery::MergeRequest {
                merge_request_id,
                diff_id: Some(diff_id),
            } => {
                self.get_version_base(owner, repository_name, merge_request_id, diff_id)
                    .await
            }
            BaseCommitQuery::MergeRequest {
                merge_request_id,
                diff_id: None,
            } => {
                self.get_mr_base(owner, repository_name, merge_request_id)
                    .await
            }
            BaseCommitQuery::Commit { commit_id } => {
                self.get_commit_parent(owner, repository_name, commit_id)
                    .await
            }
        }
    }
}

fn non_empty_sha(sha: Option<String>, field: &str) -> Result<String, ProviderError> {
    sha.filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse(format!("missing {field}")))
}

fn first_parent(commit: GitLabCommit) -> Result<String, ProviderError> {
    commit.parent_ids.into_iter().next().ok_or_else(|| {
        ProviderError::InvalidResponse(format!("commit {} has no parent", commit.id))
    })
}

/// GitLab MR response (subset).
#[derive(Debug, Deserialize)]
struct GitLabMr {
    #[serde(default)]
    diff_refs: Option<GitLabDiffRefs>,
}

#[derive(Debug, Deserialize)]
struct GitLabDiffRefs {
    #[serde(default)]
    base_sha: Option<String>,
}

/// One entry of `merge_requests/:iid/versions` (subset).
#[derive(Debug, Deserialize)]
struct GitLabMrVersion {
    #[serde(default)]
    base_commit_sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabCommit {
    id: String,
    #[serde(default)]
    parent_ids: Vec<String>,
}
