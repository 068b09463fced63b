use crate::prelude::*;
use chrono::prelude::*;
use retry_policies::policies::ExponentialBackoff;
use retry_policies::{RetryDecision, RetryPolicy};
use std::future::Future;
use std::time::Duration;

pub(crate) fn default_retry_policy() -> ExponentialBackoff {
    ExponentialBackoff::builder()
        .retry_bounds(Duration::from_millis(100), Duration::from_secs(2))
        .build_with_max_retries(3)
}

/// Runs `f` until it succeeds, fails with an error for which `is_retryable`
/// returns `false`, or the retry policy gives up.
pub(crate) async fn retry_transient<T, E, Fut>(
    f: impl Fn() -> Fut,
    is_retryable: impl Fn(&E) -> bool,
) -> Fut::Output
where
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let policy = default_retry_policy();
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(output) => {
                if attempt > 0 {
                    warn!(%attempt, "Operation succeeded after a retry");
                }
                return Ok(output);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            if attempt > 0 {
                warn!(%attempt, "Operation failed with a non-retryable error after a retry");
            }
            return Err(err);
        }

        let execute_after = match policy.should_retry(attempt) {
            RetryDecision::Retry { execute_after } => execute_after,
            RetryDecision::DoNotRetry => {
                warn!(%attempt, "Giving up retrying the operation");
                return Err(err);
            }
        };

        let duration = (execute_after.signed_duration_since(Utc::now()))
            .to_std()
            .unwrap_or_else(|err| {
                warn!(
                    err = tracing_err(&err),
                    %execute_after,
                    "Retry policy returned a negative duration, retrying immediately"
                );
                Duration::ZERO
            });

        warn!(
            %attempt,
            err = tracing_err(&err),
            duration = format_args!("{duration:.2?}"),
            "Sleeping before the next attempt",
        );

        tokio::time::sleep(duration).await;

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("attempt failed (transient: {transient})")]
    struct Failure {
        transient: bool,
    }

    #[test_log::test(tokio::test)]
    async fn retries_transient_errors_only() {
        let calls = &AtomicU32::new(0);

        let result = retry_transient(
            || async move {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < 2 {
                    return Err(Failure { transient: true });
                }
                Ok(call)
            },
            |err: &Failure| err.transient,
        )
        .await;

        assert_eq!(result.unwrap(), 2);

        calls.store(0, Ordering::SeqCst);
        let result: Result<(), _> = retry_transient(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure { transient: false })
            },
            |err: &Failure| err.transient,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
