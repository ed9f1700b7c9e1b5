use std::future::Future;
use std::time::Duration;
use tgescan_core::config::ProbeConfig;
use tgescan_core::market::error::MarketError;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// # Summary
/// 指数退避重试策略。
///
/// # Invariants
/// - 总尝试次数 (含首次) 不超过 `max_attempts`，且至少为 1。
/// - 只有 `MarketError::is_transient` 为 true 的错误会被重试。
/// - 每次尝试都受 `request_timeout` 约束，超时计为 `MarketError::Timeout`。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    request_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, request_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            request_timeout,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base(),
            config.request_timeout(),
        )
    }

    /// 第 `attempt` 次失败后的等待时间：base * 2^(attempt-1)。
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// # Summary
    /// 执行带重试的异步操作。
    ///
    /// # Logic
    /// 1. 在单次超时约束下执行操作。
    /// 2. 成功立即返回。
    /// 3. 非瞬时错误或已用尽次数时返回最后一次错误。
    /// 4. 否则按指数退避等待后重试。
    ///
    /// # Arguments
    /// * `label`: 日志中的操作名称。
    /// * `op`: 每次调用返回一个新的 Future。
    ///
    /// # Returns
    /// 操作结果或最后一次错误。
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, MarketError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MarketError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match timeout(self.request_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(MarketError::Timeout),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() || attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        op = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn test_backoff_doubles() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = policy()
            .run("op", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(MarketError::from_status(503, String::new()))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = policy()
            .run("op", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(MarketError::RateLimited("slow down".into()))
            })
            .await;
        assert!(matches!(result, Err(MarketError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = policy()
            .run("op", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(MarketError::from_status(400, "bad request".into()))
            })
            .await;
        assert!(matches!(result, Err(MarketError::Http { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_counts_as_timeout() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = policy()
            .run("op", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(MarketError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
