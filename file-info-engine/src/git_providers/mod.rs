//! Base commit lookup against the code host.
//!
//! The workflows depend on the [`BaseCommitLookup`] seam only. [`gitlab`]
//! implements it over the GitLab REST API; tests plug in in-memory fakes.

pub mod types;
pub use types::*;

pub mod gitlab;

use std::future::Future;

use crate::errors::ProviderError;

/// Finds the commit a merge request diff or a commit is compared against.
pub trait BaseCommitLookup {
    fn base_commit_id(
        &self,
        owner: &str,
        repository_name: &str,
        query: &BaseCommitQuery,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

impl<T: BaseCommitLookup + Sync> BaseCommitLookup for &T {
    fn base_commit_id(
        &self,
        owner: &str,
        repository_name: &str,
        query: &BaseCommitQuery,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        (**self).base_commit_id(owner, repository_name, query)
    }
}
