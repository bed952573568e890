//! Normalized output of every file-info workflow and the builder that
//! assembles it.

use serde::{Deserialize, Serialize};

use crate::errors::{FileInfoError, FileInfoResult, Stage};

/// Content availability hint for diff and commit views.
///
/// Both sides are reported as having contents regardless of whether the file
/// was added or deleted. Known limitation, kept as-is because consumers
/// currently rely on the value.
pub const ASSUMED_HAS_FILE_CONTENTS: bool = true;

/// Where a file lives, at which revisions, in which repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    /// Opaque repository identifier, e.g. `gitlab.com/acme/widgets`.
    pub repository: String,
    /// Revision as requested or displayed (branch, tag or commit).
    pub head_rev: String,
    /// Concrete head commit ID.
    pub head_commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_commit_id: Option<String>,
    /// Path of the file at the head revision.
    pub file_path: String,
    /// Path at the base revision, only set when the file was renamed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_has_file_contents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_has_file_contents: Option<bool>,
}

impl LocationDescriptor {
    /// True for descriptors produced by the diff and commit workflows.
    pub fn is_comparison(&self) -> bool {
        self.base_commit_id.is_some()
    }
}

/// Which workflow the builder is assembling for; decides required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    File,
    Comparison,
}

/// Accumulates descriptor fields step by step, validated once in [`build`].
///
/// [`build`]: DescriptorBuilder::build
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    kind: DescriptorKind,
    repository: String,
    head_rev: Option<String>,
    head_commit_id: Option<String>,
    base_rev: Option<String>,
    base_commit_id: Option<String>,
    file_path: Option<String>,
    base_file_path: Option<String>,
    has_file_contents: Option<(bool, bool)>,
}

impl DescriptorBuilder {
    pub fn new(kind: DescriptorKind, repository: impl Into<String>) -> Self {
        Self {
            kind,
            repository: repository.into(),
            head_rev: None,
            head_commit_id: None,
            base_rev: None,
            base_commit_id: None,
            file_path: None,
            base_file_path: None,
            has_file_contents: None,
        }
    }

    /// Sets the head side. An empty `rev` means "default branch" and is
    /// replaced by the commit ID.
    pub fn head(mut self, rev: impl Into<String>, commit_id: impl Into<String>) -> Self {
        let rev = rev.into();
        let commit_id = commit_id.into();
        self.head_rev = Some(if rev.is_empty() { commit_id.clone() } else { rev });
        self.head_commit_id = Some(commit_id);
        self
    }

    pub fn base(mut self, rev: impl Into<String>, commit_id: impl Into<String>) -> Self {
        self.base_rev = Some(rev.into());
        self.base_commit_id = Some(commit_id.into());
        self
    }

    /// Sets both paths; the base path is dropped when it equals the head path.
    pub fn paths(mut self, file_path: impl Into<String>, base_file_path: Option<String>) -> Self {
        let file_path = file_path.into();
        self.base_file_path = base_file_path.filter(|p| !p.is_empty() && *p != file_path);
        self.file_path = Some(file_path);
        self
    }

    pub fn has_file_contents(mut self, head: bool, base: bool) -> Self {
        self.has_file_contents = Some((head, base));
        self
    }

    pub fn build(self) -> FileInfoResult<LocationDescriptor> {
        let missing = |field| FileInfoError::MissingPageData {
            stage: Stage::Assembling,
            field,
        };

        if self.repository.is_empty() {
            return Err(missing("repository"));
        }
        let file_path = self
            .file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| missing("file_path"))?;
        let head_commit_id = self
            .head_commit_id
            .filter(|c| !c.is_empty())
            .ok_or_else(|| missing("head_commit_id"))?;
        let head_rev = self.head_rev.unwrap_or_else(|| head_commit_id.clone());

        let (base_rev, base_commit_id) = match self.kind {
            DescriptorKind::File => (None, None),
            DescriptorKind::Comparison => {
                let commit = self
                    .base_commit_id
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| missing("base_commit_id"))?;
                let rev = self.base_rev.filter(|r| !r.is_empty()).unwrap_or_else(|| commit.clone());
                (Some(rev), Some(commit))
            }
        };

        let (head_has_file_contents, base_has_file_contents) = match self.has_file_contents {
            Some((head, base)) => (Some(head), Some(base)),
            None => (None, None),
        };

        Ok(LocationDescriptor {
            repository: self.repository,
            head_rev,
            head_commit_id,
            base_rev,
            base_commit_id,
            file_path,
            base_file_path: self.base_file_path,
            head_has_file_contents,
            base_has_file_contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rev_falls_back_to_commit() {
        let d = DescriptorBuilder::new(DescriptorKind::File, "gitlab.com/acme/widgets")
            .head("", "abc")
            .paths("src/lib.rs", None)
            .build()
            .unwrap();
        assert_eq!(d.head_rev, "abc");
        assert_eq!(d.head_commit_id, "abc");
        assert!(!d.is_comparison());
        assert_eq!(d.head_has_file_contents, None);
    }

    #[test]
    fn unchanged_base_path_is_dropped() {
        let d = DescriptorBuilder::new(DescriptorKind::Comparison, "gitlab.com/acme/widgets")
            .head("cafef00d", "cafef00d")
            .base("deadbeef", "deadbeef")
            .paths("a.rs", Some("a.rs".into()))
            .has_file_contents(true, true)
            .build()
            .unwrap();
        assert_eq!(d.base_file_path, None);

        let renamed = DescriptorBuilder::new(DescriptorKind::Comparison, "gitlab.com/acme/widgets")
            .head("cafef00d", "cafef00d")
            .base("deadbeef", "deadbeef")
            .paths("b.rs", Some("a.rs".into()))
            .build()
            .unwrap();
        assert_eq!(renamed.base_file_path.as_deref(), Some("a.rs"));
    }

    #[test]
    fn comparison_requires_base_and_path() {
        let err = DescriptorBuilder::new(DescriptorKind::Comparison, "gitlab.com/acme/widgets")
            .head("cafef00d", "cafef00d")
            .paths("a.rs", None)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            FileInfoError::MissingPageData { field: "base_commit_id", .. }
        ));

        let err = DescriptorBuilder::new(DescriptorKind::File, "gitlab.com/acme/widgets")
            .head("main", "abc")
            .paths("", None)
            .build()
            .unwrap_err();
        assert!(matches!(err, FileInfoError::MissingPageData { field: "file_path", .. }));
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let d = DescriptorBuilder::new(DescriptorKind::File, "gitlab.com/acme/widgets")
            .head("main", "abc")
            .paths("README.md", None)
            .build()
            .unwrap();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["head_rev"], "main");
        assert!(json.get("base_commit_id").is_none());
    }
}
