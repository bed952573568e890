pub mod config;
pub mod descriptor;
mod errors;
pub mod file_info;
pub mod git_providers;
pub mod retry;
pub mod revisions;
pub mod scrape;

pub use crate::{
    config::EngineConfig,
    descriptor::LocationDescriptor,
    errors::{
        ConfigError, FileInfoError, FileInfoResult, ProviderError, ResolveRevError, RevisionSide,
        Stage,
    },
    file_info::FileInfoResolver,
    scrape::gitlab::{GitLabPage, GitLabPageExtractor, GitLabPageKind},
};

/// Resolves the file shown on a GitLab page using the configured clients.
///
/// The workflow is chosen from the page URL. Returns `Ok(None)` for pages
/// that show no file or are not file, merge request or commit views.
pub async fn resolve_gitlab_page(
    cfg: &EngineConfig,
    page: &GitLabPage,
) -> FileInfoResult<Option<LocationDescriptor>> {
    let (gitlab, sourcegraph) = cfg.build_clients()?;
    FileInfoResolver::new(GitLabPageExtractor, sourcegraph, gitlab, cfg.retry)
        .resolve_gitlab_page(page)
        .await
}
