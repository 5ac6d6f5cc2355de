use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Run `connect` until it succeeds, at most `attempts` times with `delay`
/// between tries. Returns the last error once the attempts are used up.
pub async fn connect_with_retry<T, E, F, Fut>(
    what: &str,
    attempts: u32,
    delay: Duration,
    mut connect: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Connected to {}", what);
                }
                return Ok(value);
            }
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    "{} unavailable ({}), retrying in {}s",
                    what,
                    e,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connects_after_transient_failures() {
        let mut calls = 0;

        let result = connect_with_retry("Postgres", 5, Duration::from_millis(1), || {
            calls += 1;
            let call = calls;
            async move {
                if call < 3 {
                    Err(format!("connection refused ({})", call))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let mut calls = 0;

        let result: Result<(), String> =
            connect_with_retry("Postgres", 5, Duration::from_millis(1), || {
                calls += 1;
                let call = calls;
                async move { Err(format!("connection refused ({})", call)) }
            })
            .await;

        assert_eq!(result, Err("connection refused (5)".to_string()));
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;

        let result: Result<(), &str> = connect_with_retry("Postgres", 0, Duration::from_millis(1), || {
            calls += 1;
            async { Err("connection refused") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
