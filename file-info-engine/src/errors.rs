//! Crate-wide error hierarchy for file-info-engine.

use std::fmt;

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type FileInfoResult<T> = Result<T, FileInfoError>;

/// Step of a file-info workflow, carried in errors and log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading raw fields from the page snapshot.
    Extracting,
    /// Resolving the single revision of a plain file view.
    ResolvingRevision,
    /// Fetching the base commit ID from the provider API.
    ResolvingBaseCommit,
    /// Waiting for head and base revisions to be present in the store.
    AwaitingCloneReadiness,
    /// Validating the accumulated fields into a descriptor.
    Assembling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extracting => "extracting",
            Stage::ResolvingRevision => "resolving revision",
            Stage::ResolvingBaseCommit => "resolving base commit",
            Stage::AwaitingCloneReadiness => "awaiting clone readiness",
            Stage::Assembling => "assembling",
        };
        f.write_str(s)
    }
}

/// Which side of a comparison a revision belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionSide {
    Head,
    Base,
}

impl fmt::Display for RevisionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSide::Head => f.write_str("head"),
            RevisionSide::Base => f.write_str("base"),
        }
    }
}

/// Root error type for the file-info workflows.
#[derive(Debug, Error)]
pub enum FileInfoError {
    /// The page did not expose a field the workflow cannot do without.
    #[error("missing page data while {stage}: {field}")]
    MissingPageData { stage: Stage, field: &'static str },

    /// The provider could not tell us which commit the diff is based on.
    #[error("base commit lookup failed for {owner}/{repository_name}: {source}")]
    BaseCommitLookupFailed {
        owner: String,
        repository_name: String,
        #[source]
        source: ProviderError,
    },

    /// A head or base revision could not be confirmed in the backing store.
    #[error("{side} revision {rev:?} of {repository} unresolvable while {stage}: {source}")]
    RevisionUnresolvable {
        stage: Stage,
        side: RevisionSide,
        repository: String,
        rev: String,
        #[source]
        source: ResolveRevError,
    },

    /// Configuration problems (bad base URLs, unparsable env values).
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FileInfoError {
    /// Stage at which the workflow failed, when the error belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::MissingPageData { stage, .. } => Some(*stage),
            Self::BaseCommitLookupFailed { .. } => Some(Stage::ResolvingBaseCommit),
            Self::RevisionUnresolvable { stage, .. } => Some(*stage),
            Self::Config(_) => None,
        }
    }
}

/// Failure of the revision resolver.
#[derive(Debug, Error)]
pub enum ResolveRevError {
    /// The store is still materializing the repository; retryable.
    #[error("repository {repository} clone in progress")]
    CloneInProgress {
        repository: String,
        /// Free-form progress line reported by the store, if any.
        progress: Option<String>,
    },

    /// The store does not know the repository.
    #[error("repository {repository} not found")]
    RepoNotFound { repository: String },

    /// The repository exists but the revision does not.
    #[error("revision {rev:?} not found in {repository}")]
    RevisionNotFound { repository: String, rev: String },

    /// Transport or response-shape failure talking to the store.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ResolveRevError {
    /// Returns `true` for the one classification the retry policy absorbs.
    pub fn is_clone_in_progress(&self) -> bool {
        matches!(self, Self::CloneInProgress { .. })
    }
}

impl From<reqwest::Error> for ResolveRevError {
    fn from(e: reqwest::Error) -> Self {
        ResolveRevError::Provider(ProviderError::from(e))
    }
}

/// HTTP-level error used inside the provider and store clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited,

    /// Gateway / server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (non-2xx) not covered by specific variants.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of a response.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("cannot parse env {key}={value:?}")]
    EnvParse { key: String, value: String },

    /// Invalid base API URL.
    #[error("invalid base url {key}: {value:?}")]
    InvalidBaseUrl { key: &'static str, value: String },

    /// The HTTP client could not be built.
    #[error("http client: {0}")]
    HttpClient(String),
}

// ===== Mapping from reqwest::Error into ProviderError =====

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }

        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ProviderError::Unauthorized,
                403 => ProviderError::Forbidden,
                404 => ProviderError::NotFound,
                429 => ProviderError::RateLimited,
                500..=599 => ProviderError::Server(code),
                _ => ProviderError::HttpStatus(code),
            };
        }

        if e.is_decode() {
            return ProviderError::InvalidResponse(e.to_string());
        }

        ProviderError::Network(e.to_string())
    }
}
