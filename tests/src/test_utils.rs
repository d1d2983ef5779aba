//! Logging setup and polling helpers shared by the scenarios
//!
//! The DU and UE run on their own tasks, so scenarios observe them by
//! polling snapshots (`Du::handover`, `Ue::rrc_context`, mock CU events)
//! until the expected state shows up.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing_subscriber::{fmt, EnvFilter};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for any single wait in a scenario
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Test logging at "info" unless RUST_LOG says otherwise. Every test calls
/// it; only the first call installs the subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Re-evaluates `condition` every `poll_interval` until it holds. Fails once
/// `timeout` has passed without it holding.
pub async fn wait_for_condition<F, Fut>(
    mut condition: F,
    timeout: Duration,
    poll_interval: Duration,
) -> TestResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("condition not met within {timeout:?}").into());
        }
        sleep(poll_interval).await;
    }
}

/// Synchronous check with the default timeout and poll interval.
pub async fn wait_until<F>(mut condition: F) -> TestResult
where
    F: FnMut() -> bool,
{
    wait_for_condition(
        || {
            let met = condition();
            async move { met }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_condition_set_by_another_task() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            let _ = tx.send(true);
        });

        wait_for_condition(
            || {
                let ready = *rx.borrow();
                async move { ready }
            },
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await
        .expect("flag set");
    }

    #[tokio::test]
    async fn test_timeout_names_duration() {
        let err = wait_for_condition(
            || async { false },
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await
        .expect_err("never true");
        assert!(err.to_string().contains("50ms"));
    }

    #[tokio::test]
    async fn test_wait_until_stops_polling_once_met() {
        let mut polls = 0;
        wait_until(|| {
            polls += 1;
            polls == 3
        })
        .await
        .expect("third poll");
        assert_eq!(polls, 3);
    }
}
