//! Retry policy for revisions whose repository is still being cloned.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::ResolveRevError;

/// Default delay between two resolution attempts.
pub const DEFAULT_CLONE_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Re-issues a resolution attempt while the store reports "clone in progress".
///
/// Any other failure is returned on the spot. With `max_retries == None` the
/// policy waits for the clone as long as the caller keeps polling; dropping
/// the future is the way to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneRetryPolicy {
    pub delay: Duration,
    pub max_retries: Option<u32>,
}

impl Default for CloneRetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_CLONE_RETRY_DELAY,
            max_retries: None,
        }
    }
}

impl CloneRetryPolicy {
    pub fn new(delay: Duration, max_retries: Option<u32>) -> Self {
        Self { delay, max_retries }
    }

    /// Runs `attempt` until it yields something other than `CloneInProgress`,
    /// or until the retry cap (if any) is used up.
    pub async fn run<F, Fut>(
        &self,
        repository: &str,
        rev: &str,
        mut attempt: F,
    ) -> Result<String, ResolveRevError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, ResolveRevError>>,
    {
        let mut retries: u32 = 0;

        loop {
            match attempt().await {
                Ok(commit_id) => {
                    if retries > 0 {
                        debug!(repository, rev, retries, "revision resolved after clone finished");
                    }
                    return Ok(commit_id);
                }
                Err(ResolveRevError::CloneInProgress {
                    repository: repo,
                    progress,
                }) => {
                    if self.max_retries.is_some_and(|max| retries >= max) {
                        warn!(repository, rev, retries, "giving up waiting for clone");
                        return Err(ResolveRevError::CloneInProgress {
                            repository: repo,
                            progress,
                        });
                    }

                    retries += 1;
                    warn!(
                        repository,
                        rev,
                        attempt = retries,
                        progress = progress.as_deref().unwrap_or(""),
                        "clone in progress, retrying in {:?}",
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cloning() -> ResolveRevError {
        ResolveRevError::CloneInProgress {
            repository: "gitlab.com/acme/widgets".into(),
            progress: Some("Receiving objects: 42%".into()),
        }
    }

    /// Fails with clone-in-progress `failures` times, then returns "abc".
    async fn flaky(calls: &AtomicU32, failures: u32) -> Result<String, ResolveRevError> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures { Err(cloning()) } else { Ok("abc".to_string()) }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_clone_in_progress_until_success() {
        for failures in [0u32, 1, 2, 5] {
            let counter = AtomicU32::new(0);
            let calls = &counter;
            let policy = CloneRetryPolicy::default();
            let out = policy
                .run("gitlab.com/acme/widgets", "main", move || flaky(calls, failures))
                .await
                .unwrap();
            assert_eq!(out, "abc");
            assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = CloneRetryPolicy::default();
        let err = policy
            .run("gitlab.com/acme/widgets", "main", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(ResolveRevError::Provider(ProviderError::Unauthorized))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveRevError::Provider(ProviderError::Unauthorized)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cap_surfaces_last_clone_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = CloneRetryPolicy::new(Duration::from_millis(10), Some(2));
        let err = policy
            .run("gitlab.com/acme/widgets", "main", move || flaky(calls, u32::MAX))
            .await
            .unwrap_err();
        assert!(err.is_clone_in_progress());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_future_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = CloneRetryPolicy::default();

        let counter = calls.clone();
        let waited = tokio::time::timeout(
            Duration::from_millis(2500),
            policy.run("gitlab.com/acme/widgets", "main", move || {
                let counter = counter.clone();
                async move { flaky(&counter, u32::MAX).await }
            }),
        )
        .await;
        assert!(waited.is_err());

        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }
}
