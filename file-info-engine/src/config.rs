//! Runtime configuration for the HTTP collaborators and the retry policy.

use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::errors::ConfigError;
use crate::git_providers::gitlab::GitLabClient;
use crate::retry::{CloneRetryPolicy, DEFAULT_CLONE_RETRY_DELAY};
use crate::revisions::sourcegraph::SourcegraphClient;

const DEFAULT_GITLAB_API_BASE: &str = "https://gitlab.com/api/v4";
const DEFAULT_SOURCEGRAPH_URL: &str = "https://sourcegraph.com";

/// Endpoints, credentials and retry settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// API base for GitLab, e.g. "https://gitlab.com/api/v4".
    pub gitlab_api_base: String,
    /// Optional "PRIVATE-TOKEN" for private projects.
    pub gitlab_token: Option<String>,
    /// Root URL of the code-search instance.
    pub sourcegraph_url: String,
    /// Optional access token for the code-search instance.
    pub sourcegraph_token: Option<String>,
    pub retry: CloneRetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gitlab_api_base: DEFAULT_GITLAB_API_BASE.into(),
            gitlab_token: None,
            sourcegraph_url: DEFAULT_SOURCEGRAPH_URL.into(),
            sourcegraph_token: None,
            retry: CloneRetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `GITLAB_API_BASE` (default: "https://gitlab.com/api/v4")
    /// - `GITLAB_TOKEN` (optional)
    /// - `SOURCEGRAPH_URL` (default: "https://sourcegraph.com")
    /// - `SOURCEGRAPH_TOKEN` (optional)
    /// - `CLONE_RETRY_DELAY_MS` (default: 1000)
    /// - `CLONE_RETRY_MAX_ATTEMPTS` (optional; total resolver calls per revision,
    ///   unset retries until cancelled)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let delay_ms = read_parsed::<u64>(&non_empty, "CLONE_RETRY_DELAY_MS")?;
        // The first call is an attempt too, so N attempts leave N - 1 retries.
        let max_retries = read_parsed::<u32>(&non_empty, "CLONE_RETRY_MAX_ATTEMPTS")?
            .map(|attempts| attempts.saturating_sub(1));

        let cfg = Self {
            gitlab_api_base: non_empty("GITLAB_API_BASE")
                .unwrap_or_else(|| DEFAULT_GITLAB_API_BASE.into()),
            gitlab_token: non_empty("GITLAB_TOKEN"),
            sourcegraph_url: non_empty("SOURCEGRAPH_URL")
                .unwrap_or_else(|| DEFAULT_SOURCEGRAPH_URL.into()),
            sourcegraph_token: non_empty("SOURCEGRAPH_TOKEN"),
            retry: CloneRetryPolicy::new(
                delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_CLONE_RETRY_DELAY),
                max_retries,
            ),
        };
        cfg.validate()?;

        debug!(
            gitlab_api_base = %cfg.gitlab_api_base,
            sourcegraph_url = %cfg.sourcegraph_url,
            retry_delay = ?cfg.retry.delay,
            retry_max = ?cfg.retry.max_retries,
            "engine config loaded"
        );
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_base_url("GITLAB_API_BASE", &self.gitlab_api_base)?;
        check_base_url("SOURCEGRAPH_URL", &self.sourcegraph_url)?;
        Ok(())
    }

    /// Builds the GitLab and Sourcegraph clients over one shared HTTP client.
    pub fn build_clients(&self) -> Result<(GitLabClient, SourcegraphClient), ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent("file-info-engine/0.1")
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let gitlab = GitLabClient::new(
            http.clone(),
            self.gitlab_api_base.clone(),
            self.gitlab_token.clone(),
        );
        let sourcegraph = SourcegraphClient::new(
            http,
            self.sourcegraph_url.clone(),
            self.sourcegraph_token.clone(),
        );
        Ok((gitlab, sourcegraph))
    }
}

fn check_base_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidBaseUrl {
            key,
            value: value.to_string(),
        }),
    }
}

/// Reads and parses an optional variable; present but invalid is an error.
fn read_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvParse {
                key: key.into(),
                value: v,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ResolveRevError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_retry_without_cap() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.gitlab_api_base, "https://gitlab.com/api/v4");
        assert_eq!(cfg.retry.max_retries, None);
        assert_eq!(cfg.retry.delay, Duration::from_millis(1000));
        assert!(cfg.gitlab_token.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = from_pairs(&[
            ("GITLAB_API_BASE", "https://git.acme.dev/api/v4"),
            ("GITLAB_TOKEN", "glpat-x"),
            ("CLONE_RETRY_DELAY_MS", "250"),
            ("CLONE_RETRY_MAX_ATTEMPTS", "5"),
            ("SOURCEGRAPH_TOKEN", " "),
        ])
        .unwrap();
        assert_eq!(cfg.gitlab_api_base, "https://git.acme.dev/api/v4");
        assert_eq!(cfg.gitlab_token.as_deref(), Some("glpat-x"));
        assert_eq!(cfg.retry, CloneRetryPolicy::new(Duration::from_millis(250), Some(4)));
        assert!(cfg.sourcegraph_token.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        let err = from_pairs(&[("CLONE_RETRY_MAX_ATTEMPTS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParse { ref key, .. } if key == "CLONE_RETRY_MAX_ATTEMPTS"));

        let err = from_pairs(&[("SOURCEGRAPH_URL", "ftp://sg")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { key: "SOURCEGRAPH_URL", .. }));
    }

    async fn calls_until_given_up(cfg: &EngineConfig) -> u32 {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = cfg
            .retry
            .run("gitlab.com/acme/widgets", "main", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ResolveRevError::CloneInProgress {
                    repository: "gitlab.com/acme/widgets".into(),
                    progress: None,
                })
            })
            .await;
        assert!(matches!(result, Err(ResolveRevError::CloneInProgress { .. })));
        counter.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_counts_every_resolver_call() {
        let cfg = from_pairs(&[("CLONE_RETRY_MAX_ATTEMPTS", "2")]).unwrap();
        assert_eq!(calls_until_given_up(&cfg).await, 2);

        let cfg = from_pairs(&[("CLONE_RETRY_MAX_ATTEMPTS", "1")]).unwrap();
        assert_eq!(calls_until_given_up(&cfg).await, 1);
    }
}
