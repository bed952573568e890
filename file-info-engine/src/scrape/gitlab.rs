//! GitLab page extraction from URLs and code view snapshots.
//!
//! Supported paths (the `-/` scope segment is optional):
//!   * /:owner/:repo/-/blob/:rev/:path
//!   * /:owner/:repo/-/merge_requests/:iid/diffs?diff_id=..&start_sha=..
//!   * /:owner/:repo/-/commit/:sha
//!
//! `:owner` may span several segments for nested groups.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::scrape::{CommitPageInfo, DiffPageInfo, FilePageInfo, FilePaths, PageExtractor};

const BLOB: &str = "blob";
const MERGE_REQUESTS: &str = "merge_requests";
const COMMIT: &str = "commit";

/// What a code view exposes once rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeViewSnapshot {
    /// `href` of the "View file @ <sha>" control of a diff file.
    #[serde(default)]
    pub view_file_href: Option<String>,
    /// Titles of the file header: one entry, or `[old, new]` after a rename.
    #[serde(default)]
    pub file_title_names: Vec<String>,
}

/// A GitLab page: its URL plus the code view being annotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabPage {
    pub url: String,
    #[serde(default)]
    pub code_view: CodeViewSnapshot,
}

impl GitLabPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            code_view: CodeViewSnapshot::default(),
        }
    }

    pub fn with_code_view(mut self, code_view: CodeViewSnapshot) -> Self {
        self.code_view = code_view;
        self
    }
}

/// Kind of GitLab page, used to pick the matching workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitLabPageKind {
    File,
    MergeRequest,
    Commit,
    Other,
}

impl GitLabPageKind {
    pub fn detect(url: &str) -> Self {
        let Some(parsed) = ParsedUrl::parse(url) else {
            return Self::Other;
        };
        match parsed.route() {
            Some((_, BLOB, _)) => Self::File,
            Some((_, MERGE_REQUESTS, rest)) if !rest.is_empty() => Self::MergeRequest,
            Some((_, COMMIT, rest)) if !rest.is_empty() => Self::Commit,
            _ => Self::Other,
        }
    }
}

/// Stateless GitLab extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitLabPageExtractor;

impl PageExtractor for GitLabPageExtractor {
    type Page = GitLabPage;

    fn file_page_info(&self, page: &GitLabPage) -> FilePageInfo {
        let Some(parsed) = ParsedUrl::parse(&page.url) else {
            return FilePageInfo::default();
        };
        let repository = parsed.repository();
        match parsed.route() {
            Some((_, BLOB, rest)) => {
                let rev = rest.first().cloned();
                let file_path = Some(rest.get(1..).unwrap_or_default().join("/"))
                    .filter(|p| !p.is_empty());
                FilePageInfo {
                    repository,
                    file_path,
                    rev,
                }
            }
            _ => FilePageInfo {
                repository,
                ..FilePageInfo::default()
            },
        }
    }

    fn diff_page_info(&self, page: &GitLabPage) -> DiffPageInfo {
        let Some(parsed) = ParsedUrl::parse(&page.url) else {
            return DiffPageInfo::default();
        };
        let (owner, repository_name) = parsed.owner_and_name().unzip();
        let merge_request_id = match parsed.route() {
            Some((_, MERGE_REQUESTS, rest)) => rest.first().cloned(),
            _ => None,
        };
        DiffPageInfo {
            repository: parsed.repository(),
            owner,
            repository_name,
            merge_request_id,
            diff_id: parsed.query("diff_id"),
            base_commit_id: parsed.query("start_sha"),
        }
    }

    fn commit_page_info(&self, page: &GitLabPage) -> CommitPageInfo {
        let Some(parsed) = ParsedUrl::parse(&page.url) else {
            return CommitPageInfo::default();
        };
        let (owner, repository_name) = parsed.owner_and_name().unzip();
        let commit_id = match parsed.route() {
            Some((_, COMMIT, rest)) => rest.first().cloned(),
            _ => None,
        };
        CommitPageInfo {
            repository: parsed.repository(),
            owner,
            repository_name,
            commit_id,
        }
    }

    fn head_commit_id(&self, page: &GitLabPage) -> Option<String> {
        let href = page.code_view.view_file_href.as_deref()?;
        let path = href.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (_, idx) = split_route(&segments)?;
        if segments[idx] != BLOB {
            return None;
        }
        segments.get(idx + 1).map(|s| s.to_string())
    }

    fn file_paths(&self, page: &GitLabPage) -> FilePaths {
        let titles: Vec<&str> = page
            .code_view
            .file_title_names
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        match titles.as_slice() {
            [] => FilePaths::default(),
            [only] => FilePaths {
                file_path: Some(only.to_string()),
                base_file_path: None,
            },
            [old, new, ..] => FilePaths {
                file_path: Some(new.to_string()),
                base_file_path: (old != new).then(|| old.to_string()),
            },
        }
    }
}

/// Locates the route keyword in a GitLab path.
///
/// Returns the end of the project segments and the keyword index. A keyword
/// behind the `-` scope wins; group and project names may themselves be
/// `blob`, `commit` or `merge_requests`. Without the scope the first keyword
/// preceded by at least an owner and a name is taken, as long as no `-`
/// comes before it.
fn split_route<S: AsRef<str>>(segments: &[S]) -> Option<(usize, usize)> {
    let is_keyword = |s: &S| matches!(s.as_ref(), BLOB | MERGE_REQUESTS | COMMIT);
    let is_scope = |s: &S| s.as_ref() == "-";

    let scoped = segments
        .windows(2)
        .position(|pair| is_scope(&pair[0]) && is_keyword(&pair[1]));
    match scoped {
        Some(dash) if dash >= 2 => Some((dash, dash + 1)),
        Some(_) => None,
        None => segments
            .iter()
            .take_while(|s| !is_scope(s))
            .enumerate()
            .skip(2)
            .find(|(_, s)| is_keyword(s))
            .map(|(idx, _)| (idx, idx)),
    }
}

/// URL split into decoded path segments and query pairs.
struct ParsedUrl {
    host: String,
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl ParsedUrl {
    fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        let host = url.host_str()?.to_string();
        let segments = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect();
        let query = url.query_pairs().into_owned().collect();
        Some(Self {
            host,
            segments,
            query,
        })
    }

    /// Splits the path into project segments, route keyword and the rest.
    fn route(&self) -> Option<(&[String], &str, &[String])> {
        let (project_end, idx) = split_route(&self.segments)?;
        Some((
            &self.segments[..project_end],
            self.segments[idx].as_str(),
            &self.segments[idx + 1..],
        ))
    }

    fn owner_and_name(&self) -> Option<(String, String)> {
        let (project, _, _) = self.route()?;
        let (name, owner) = project.split_last()?;
        Some((owner.join("/"), name.clone()))
    }

    fn repository(&self) -> Option<String> {
        let (owner, name) = self.owner_and_name()?;
        Some(format!("{}/{}/{}", self.host, owner, name))
    }

    fn query(&self, key: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_page_fields() {
        let page = GitLabPage::new("https://gitlab.com/acme/widgets/-/blob/main/src/lib%20a.rs");
        let info = GitLabPageExtractor.file_page_info(&page);
        assert_eq!(info.repository.as_deref(), Some("gitlab.com/acme/widgets"));
        assert_eq!(info.rev.as_deref(), Some("main"));
        assert_eq!(info.file_path.as_deref(), Some("src/lib a.rs"));
    }

    #[test]
    fn nested_groups_and_no_scope_segment() {
        let page = GitLabPage::new("https://gitlab.example.com/acme/platform/widgets/blob/v1.2/README.md");
        let info = GitLabPageExtractor.file_page_info(&page);
        assert_eq!(
            info.repository.as_deref(),
            Some("gitlab.example.com/acme/platform/widgets")
        );

        let mr = GitLabPage::new("https://gitlab.example.com/acme/platform/widgets/-/merge_requests/3");
        let info = GitLabPageExtractor.diff_page_info(&mr);
        assert_eq!(info.owner.as_deref(), Some("acme/platform"));
        assert_eq!(info.repository_name.as_deref(), Some("widgets"));
    }

    #[test]
    fn tree_root_has_no_file_path() {
        let page = GitLabPage::new("https://gitlab.com/acme/widgets/-/blob/main");
        let info = GitLabPageExtractor.file_page_info(&page);
        assert_eq!(info.rev.as_deref(), Some("main"));
        assert_eq!(info.file_path, None);

        let other = GitLabPage::new("https://gitlab.com/acme/widgets/-/issues/1");
        assert_eq!(GitLabPageExtractor.file_page_info(&other).file_path, None);
    }

    #[test]
    fn diff_page_fields() {
        let page = GitLabPage::new(
            "https://gitlab.com/acme/widgets/-/merge_requests/42/diffs?diff_id=7&start_sha=abc123",
        );
        let info = GitLabPageExtractor.diff_page_info(&page);
        assert_eq!(info.owner.as_deref(), Some("acme"));
        assert_eq!(info.repository_name.as_deref(), Some("widgets"));
        assert_eq!(info.merge_request_id.as_deref(), Some("42"));
        assert_eq!(info.diff_id.as_deref(), Some("7"));
        assert_eq!(info.base_commit_id.as_deref(), Some("abc123"));

        let bare = GitLabPage::new("https://gitlab.com/acme/widgets/-/merge_requests/42/diffs");
        let info = GitLabPageExtractor.diff_page_info(&bare);
        assert_eq!(info.diff_id, None);
        assert_eq!(info.base_commit_id, None);
    }

    #[test]
    fn commit_page_fields() {
        let page = GitLabPage::new("https://gitlab.com/acme/widgets/-/commit/1111111?view=parallel");
        let info = GitLabPageExtractor.commit_page_info(&page);
        assert_eq!(info.commit_id.as_deref(), Some("1111111"));
        assert_eq!(info.repository.as_deref(), Some("gitlab.com/acme/widgets"));
    }

    #[test]
    fn head_commit_from_view_file_href() {
        let page = GitLabPage::new("https://gitlab.com/acme/widgets/-/merge_requests/42/diffs")
            .with_code_view(CodeViewSnapshot {
                view_file_href: Some("/acme/widgets/-/blob/cafef00d/src/main.rs".into()),
                file_title_names: vec![],
            });
        assert_eq!(
            GitLabPageExtractor.head_commit_id(&page).as_deref(),
            Some("cafef00d")
        );
        assert_eq!(
            GitLabPageExtractor.head_commit_id(&GitLabPage::new("https://gitlab.com/a/b")),
            None
        );
    }

    #[test]
    fn project_names_that_match_route_keywords() {
        let page = GitLabPage::new("https://gitlab.com/commit/widgets/-/blob/main/src/lib.rs");
        assert_eq!(GitLabPageKind::detect(&page.url), GitLabPageKind::File);
        let info = GitLabPageExtractor.file_page_info(&page);
        assert_eq!(info.repository.as_deref(), Some("gitlab.com/commit/widgets"));
        assert_eq!(info.rev.as_deref(), Some("main"));
        assert_eq!(info.file_path.as_deref(), Some("src/lib.rs"));

        let mr = GitLabPage::new("https://gitlab.com/acme/blob/-/merge_requests/7/diffs");
        assert_eq!(GitLabPageKind::detect(&mr.url), GitLabPageKind::MergeRequest);
        let info = GitLabPageExtractor.diff_page_info(&mr);
        assert_eq!(info.owner.as_deref(), Some("acme"));
        assert_eq!(info.repository_name.as_deref(), Some("blob"));
        assert_eq!(info.merge_request_id.as_deref(), Some("7"));

        let page = GitLabPage::new("https://gitlab.com/blob/widgets/-/merge_requests/7/diffs")
            .with_code_view(CodeViewSnapshot {
                view_file_href: Some("/blob/widgets/-/blob/cafef00d/a.rs".into()),
                file_title_names: vec![],
            });
        assert_eq!(
            GitLabPageExtractor.head_commit_id(&page).as_deref(),
            Some("cafef00d")
        );
    }

    #[test]
    fn renamed_file_paths() {
        let view = |titles: &[&str]| {
            GitLabPage::new("https://gitlab.com/acme/widgets/-/commit/1111111").with_code_view(
                CodeViewSnapshot {
                    view_file_href: None,
                    file_title_names: titles.iter().map(|t| t.to_string()).collect(),
                },
            )
        };

        let same = GitLabPageExtractor.file_paths(&view(&["src/a.rs"]));
        assert_eq!(same.file_path.as_deref(), Some("src/a.rs"));
        assert_eq!(same.base_file_path, None);

        let moved = GitLabPageExtractor.file_paths(&view(&["src/a.rs", "src/b.rs"]));
        assert_eq!(moved.file_path.as_deref(), Some("src/b.rs"));
        assert_eq!(moved.base_file_path.as_deref(), Some("src/a.rs"));

        assert_eq!(GitLabPageExtractor.file_paths(&view(&[])), FilePaths::default());
    }

    #[test]
    fn detects_page_kind() {
        let kind = GitLabPageKind::detect;
        assert_eq!(kind("https://gitlab.com/acme/widgets/-/blob/main/a.rs"), GitLabPageKind::File);
        assert_eq!(
            kind("https://gitlab.com/acme/widgets/-/merge_requests/42/diffs"),
            GitLabPageKind::MergeRequest
        );
        assert_eq!(kind("https://gitlab.com/acme/widgets/-/commit/1111111"), GitLabPageKind::Commit);
        assert_eq!(kind("https://gitlab.com/acme/widgets/-/merge_requests"), GitLabPageKind::Other);
        assert_eq!(kind("not a url"), GitLabPageKind::Other);
    }
}
