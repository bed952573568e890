//! Raw fields read from a rendered code-host page.
//!
//! Extraction is pure: no I/O, and a page that lacks the expected markup
//! yields `None` fields instead of an error. The workflows decide which
//! fields are mandatory.

pub mod gitlab;

use serde::{Deserialize, Serialize};

/// Fields of a single-file view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePageInfo {
    pub repository: Option<String>,
    pub file_path: Option<String>,
    /// Revision shown in the URL; empty or absent means the default branch.
    pub rev: Option<String>,
}

/// Fields of a merge request diff view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPageInfo {
    pub repository: Option<String>,
    pub owner: Option<String>,
    pub repository_name: Option<String>,
    pub merge_request_id: Option<String>,
    pub diff_id: Option<String>,
    /// Present when the page already names the base (e.g. `start_sha`).
    pub base_commit_id: Option<String>,
}

/// Fields of a single commit view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPageInfo {
    pub repository: Option<String>,
    pub owner: Option<String>,
    pub repository_name: Option<String>,
    pub commit_id: Option<String>,
}

/// Head and base paths of one file in a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePaths {
    pub file_path: Option<String>,
    /// Only set when the file was renamed or moved.
    pub base_file_path: Option<String>,
}

/// Reads page-type-specific fields out of a page snapshot.
pub trait PageExtractor {
    /// Snapshot of the rendered page this extractor understands.
    type Page;

    fn file_page_info(&self, page: &Self::Page) -> FilePageInfo;

    fn diff_page_info(&self, page: &Self::Page) -> DiffPageInfo;

    fn commit_page_info(&self, page: &Self::Page) -> CommitPageInfo;

    /// Head commit of a diff, read from the code view rather than the URL.
    fn head_commit_id(&self, page: &Self::Page) -> Option<String>;

    /// File paths of the code view, rename-aware.
    fn file_paths(&self, page: &Self::Page) -> FilePaths;
}
