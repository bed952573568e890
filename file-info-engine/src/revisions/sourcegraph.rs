//! Sourcegraph GraphQL client for revision resolution.
//!
//! Endpoint used:
//!   * POST /.api/graphql?ResolveRev

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ProviderError, ResolveRevError};
use crate::revisions::RevisionResolver;

const RESOLVE_REV_QUERY: &str = r#"query ResolveRev($repoName: String!, $rev: String!) {
    repository(name: $repoName) {
        mirrorInfo {
            cloneInProgress
            cloneProgress
        }
        commit(rev: $rev) {
            oid
        }
    }
}"#;

/// Sourcegraph HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct SourcegraphClient {
    http: Client,
    base_url: String,      // e.g. "https://sourcegraph.com"
    token: Option<String>, // "Authorization: token <...>"
}

impl SourcegraphClient {
    pub fn new(http: Client, base_url: String, token: Option<String>) -> Self {
        debug!("Creating SourcegraphClient with base_url={}", base_url);
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn query_resolve_rev(
        &self,
        repository: &str,
        rev: &str,
    ) -> Result<GraphQlResponse<ResolveRevData>, ResolveRevError> {
        let url = format!("{}/.api/graphql?ResolveRev", self.base_url);
        debug!("Sourcegraph resolve_rev: {} repo={} rev={:?}", url, repository, rev);

        let body = GraphQlRequest {
            query: RESOLVE_REV_QUERY,
            variables: ResolveRevVariables {
                repo_name: repository,
                rev,
            },
        };

        let mut req = self.http.post(url).json(&body);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {token}"));
        }

        let resp = req.send().await?.error_for_status()?.json().await?;
        Ok(resp)
    }
}

impl RevisionResolver for SourcegraphClient {
    async fn resolve_rev(&self, repository: &str, rev: &str) -> Result<String, ResolveRevError> {
        let resp = self.query_resolve_rev(repository, rev).await?;
        interpret_resolve_rev(repository, rev, resp)
    }
}

/// Maps a `ResolveRev` response onto a commit ID or a typed failure.
///
/// A clone in progress wins over a missing commit: while cloning, the store
/// cannot know yet whether the revision exists.
fn interpret_resolve_rev(
    repository: &str,
    rev: &str,
    resp: GraphQlResponse<ResolveRevData>,
) -> Result<String, ResolveRevError> {
    if let Some(errors) = resp.errors.filter(|e| !e.is_empty()) {
        let joined = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ProviderError::InvalidResponse(joined).into());
    }

    let repo = resp
        .data
        .and_then(|d| d.repository)
        .ok_or_else(|| ResolveRevError::RepoNotFound {
            repository: repository.to_string(),
        })?;

    if let Some(mirror) = &repo.mirror_info {
        if mirror.clone_in_progress {
            return Err(ResolveRevError::CloneInProgress {
                repository: repository.to_string(),
                progress: mirror.clone_progress.clone(),
            });
        }
    }

    repo.commit
        .map(|c| c.oid)
        .ok_or_else(|| ResolveRevError::RevisionNotFound {
            repository: repository.to_string(),
            rev: rev.to_string(),
        })
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'static str,
    variables: ResolveRevVariables<'a>,
}

#[derive(Debug, Serialize)]
struct ResolveRevVariables<'a> {
    #[serde(rename = "repoName")]
    repo_name: &'a str,
    rev: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResolveRevData {
    repository: Option<SgRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SgRepository {
    #[serde(default)]
    mirror_info: Option<SgMirrorInfo>,
    commit: Option<SgCommit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SgMirrorInfo {
    clone_in_progress: bool,
    #[serde(default)]
    clone_progress: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SgCommit {
    oid: String,
}
