//! Revision resolution against the code-search store.
//!
//! The workflows only need [`RevisionResolver`]; [`sourcegraph`] provides the
//! HTTP implementation used by the binary.

pub mod sourcegraph;

use std::future::Future;

use crate::errors::ResolveRevError;

/// Turns a revision specifier into a concrete commit ID.
///
/// An empty `rev` asks for the repository's default branch. Implementations
/// report an unfinished clone as [`ResolveRevError::CloneInProgress`] so the
/// retry policy can wait for it.
pub trait RevisionResolver {
    fn resolve_rev(
        &self,
        repository: &str,
        rev: &str,
    ) -> impl Future<Output = Result<String, ResolveRevError>> + Send;
}

impl<T: RevisionResolver + Sync> RevisionResolver for &T {
    fn resolve_rev(
        &self,
        repository: &str,
        rev: &str,
    ) -> impl Future<Output = Result<String, ResolveRevError>> + Send {
        (**self).resolve_rev(repository, rev)
    }
}
