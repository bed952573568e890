//! File-info workflows: plain file views, merge request diffs and commits.
//!
//! Each workflow reads raw fields from the page, fetches what the page does
//! not carry, and confirms every revision it reports against the store before
//! returning a [`LocationDescriptor`].

use tracing::{Instrument, debug, info, info_span, warn};

use crate::descriptor::{
    ASSUMED_HAS_FILE_CONTENTS, DescriptorBuilder, DescriptorKind, LocationDescriptor,
};
use crate::errors::{FileInfoError, FileInfoResult, ResolveRevError, RevisionSide, Stage};
use crate::git_providers::{BaseCommitLookup, BaseCommitQuery};
use crate::retry::CloneRetryPolicy;
use crate::revisions::RevisionResolver;
use crate::scrape::gitlab::{GitLabPage, GitLabPageExtractor, GitLabPageKind};
use crate::scrape::{DiffPageInfo, PageExtractor};

/// Resolves location descriptors with injected collaborators.
///
/// Holds no per-call state: every method builds its descriptor from scratch.
#[derive(Debug, Clone)]
pub struct FileInfoResolver<E, R, L> {
    extractor: E,
    resolver: R,
    lookup: L,
    retry: CloneRetryPolicy,
}

impl<E, R, L> FileInfoResolver<E, R, L>
where
    E: PageExtractor,
    R: RevisionResolver,
    L: BaseCommitLookup,
{
    pub fn new(extractor: E, resolver: R, lookup: L, retry: CloneRetryPolicy) -> Self {
        Self {
            extractor,
            resolver,
            lookup,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &CloneRetryPolicy {
        &self.retry
    }

    /// Resolves a page showing a single file.
    ///
    /// Returns `Ok(None)` when the page shows no file.
    pub async fn resolve_file_info(
        &self,
        page: &E::Page,
    ) -> FileInfoResult<Option<LocationDescriptor>> {
        let info = self.extractor.file_page_info(page);
        let Some(file_path) = info.file_path.filter(|p| !p.is_empty()) else {
            debug!("no file path on page, nothing to resolve");
            return Ok(None);
        };
        let repository = required(info.repository, "repository")?;
        let rev = info.rev.unwrap_or_default();

        let span = info_span!("resolve_file_info", %repository, %rev);
        async move {
            let commit_id = self
                .resolve_with_retry(Stage::ResolvingRevision, RevisionSide::Head, &repository, &rev)
                .await?;

            let descriptor = DescriptorBuilder::new(DescriptorKind::File, repository)
                .head(rev, commit_id)
                .paths(file_path, None)
                .build()?;

            info!(commit = %descriptor.head_commit_id, path = %descriptor.file_path, "file info resolved");
            Ok(Some(descriptor))
        }
        .instrument(span)
        .await
    }

    /// Resolves one file of a merge request diff.
    pub async fn resolve_diff_file_info(&self, page: &E::Page) -> FileInfoResult<LocationDescriptor> {
        let DiffPageInfo {
            repository,
            owner,
            repository_name,
            merge_request_id,
            diff_id,
            base_commit_id,
        } = self.extractor.diff_page_info(page);
        let repository = required(repository, "repository")?;
        let owner = required(owner, "owner")?;
        let repository_name = required(repository_name, "repository_name")?;

        let span = info_span!("resolve_diff_file_info", %repository);
        async move {
            let base_commit_id = match base_commit_id.filter(|c| !c.is_empty()) {
                Some(commit) => {
                    debug!(base = %commit, "base commit taken from page");
                    commit
                }
                None => {
                    let merge_request_id = required(merge_request_id, "merge_request_id")?;
                    let query = BaseCommitQuery::merge_request(merge_request_id, diff_id);
                    self.lookup_base_commit(&owner, &repository_name, &query)
                        .await?
                }
            };

            let head_commit_id = required(self.extractor.head_commit_id(page), "head_commit_id")?;
            let paths = self.extractor.file_paths(page);
            let file_path = required(paths.file_path, "file_path")?;

            let builder = DescriptorBuilder::new(DescriptorKind::Comparison, repository)
                .head(head_commit_id.clone(), head_commit_id)
                .base(base_commit_id.clone(), base_commit_id)
                .paths(file_path, paths.base_file_path)
                .has_file_contents(ASSUMED_HAS_FILE_CONTENTS, ASSUMED_HAS_FILE_CONTENTS);

            self.finish_comparison(builder).await
        }
        .instrument(span)
        .await
    }

    /// Resolves one file of a commit view, compared against its first parent.
    pub async fn resolve_commit_file_info(
        &self,
        page: &E::Page,
    ) -> FileInfoResult<LocationDescriptor> {
        let info = self.extractor.commit_page_info(page);
        let repository = required(info.repository, "repository")?;
        let owner = required(info.owner, "owner")?;
        let repository_name = required(info.repository_name, "repository_name")?;
        let commit_id = required(info.commit_id, "commit_id")?;

        let span = info_span!("resolve_commit_file_info", %repository, commit = %commit_id);
        async move {
            let query = BaseCommitQuery::commit(commit_id.clone());
            let base_commit_id = self
                .lookup_base_commit(&owner, &repository_name, &query)
                .await?;

            let paths = self.extractor.file_paths(page);
            let file_path = required(paths.file_path, "file_path")?;

            let builder = DescriptorBuilder::new(DescriptorKind::Comparison, repository)
                .head(commit_id.clone(), commit_id)
                .base(base_commit_id.clone(), base_commit_id)
                .paths(file_path, paths.base_file_path)
                .has_file_contents(ASSUMED_HAS_FILE_CONTENTS, ASSUMED_HAS_FILE_CONTENTS);

            self.finish_comparison(builder).await
        }
        .instrument(span)
        .await
    }

    /// Validates the builder, then waits until both sides are in the store.
    async fn finish_comparison(&self, builder: DescriptorBuilder) -> FileInfoResult<LocationDescriptor> {
        let descriptor = builder.build()?;
        self.ensure_revisions_are_cloned(&descriptor).await?;

        info!(
            head = %descriptor.head_commit_id,
            base = descriptor.base_commit_id.as_deref().unwrap_or_default(),
            path = %descriptor.file_path,
            "comparison file info resolved"
        );
        Ok(descriptor)
    }

    /// Resolves head and base concurrently; fails as soon as either fails.
    ///
    /// The commit IDs come from the page or the provider API, which says
    /// nothing about whether the store has cloned them yet.
    pub async fn ensure_revisions_are_cloned(
        &self,
        descriptor: &LocationDescriptor,
    ) -> FileInfoResult<()> {
        let repository = descriptor.repository.as_str();
        let base_rev = descriptor
            .base_rev
            .as_deref()
            .ok_or(FileInfoError::MissingPageData {
                stage: Stage::AwaitingCloneReadiness,
                field: "base_rev",
            })?;

        debug!(head = %descriptor.head_rev, base = %base_rev, "awaiting clone readiness");
        let stage = Stage::AwaitingCloneReadiness;
        tokio::try_join!(
            self.resolve_with_retry(stage, RevisionSide::Head, repository, &descriptor.head_rev),
            self.resolve_with_retry(stage, RevisionSide::Base, repository, base_rev),
        )?;
        Ok(())
    }

    async fn resolve_with_retry(
        &self,
        stage: Stage,
        side: RevisionSide,
        repository: &str,
        rev: &str,
    ) -> FileInfoResult<String> {
        self.retry
            .run(repository, rev, || self.resolver.resolve_rev(repository, rev))
            .await
            .map_err(|source: ResolveRevError| FileInfoError::RevisionUnresolvable {
                stage,
                side,
                repository: repository.to_string(),
                rev: rev.to_string(),
                source,
            })
    }

    async fn lookup_base_commit(
        &self,
        owner: &str,
        repository_name: &str,
        query: &BaseCommitQuery,
    ) -> FileInfoResult<String> {
        debug!(owner, repository_name, ?query, "looking up base commit");
        self.lookup
            .base_commit_id(owner, repository_name, query)
            .await
            .map_err(|source| FileInfoError::BaseCommitLookupFailed {
                owner: owner.to_string(),
                repository_name: repository_name.to_string(),
                source,
            })
    }
}

impl<R, L> FileInfoResolver<GitLabPageExtractor, R, L>
where
    R: RevisionResolver,
    L: BaseCommitLookup,
{
    /// Runs the workflow matching the page URL.
    ///
    /// Returns `Ok(None)` for pages that show no file or are not file, merge
    /// request or commit views; no collaborator is called for the latter.
    pub async fn resolve_gitlab_page(
        &self,
        page: &GitLabPage,
    ) -> FileInfoResult<Option<LocationDescriptor>> {
        let kind = GitLabPageKind::detect(&page.url);
        info!(?kind, url = %page.url, "resolve_gitlab_page started");

        match kind {
            GitLabPageKind::File => self.resolve_file_info(page).await,
            GitLabPageKind::MergeRequest => self.resolve_diff_file_info(page).await.map(Some),
            GitLabPageKind::Commit => self.resolve_commit_file_info(page).await.map(Some),
            GitLabPageKind::Other => {
                warn!(url = %page.url, "page is not a file, merge request or commit view");
                Ok(None)
            }
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> FileInfoResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(FileInfoError::MissingPageData {
            stage: Stage::Extracting,
            field,
        })
}
