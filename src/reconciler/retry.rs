use crate::plugin::PluginError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles after every failure, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay after the `failures`-th consecutive failure (1-based).
    fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failures.saturating_sub(1));
                initial.checked_mul(factor).map_or(max, |d| d.min(max))
            }
        }
    }
}

/// Bounded retry around one plugin call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            backoff: Backoff::Fixed(Duration::from_millis(10)),
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until it succeeds or the attempts run out, returning the last error.
    /// Every failed attempt is counted.
    pub(crate) async fn run<F, Fut>(
        &self,
        logger: &slog::Logger,
        errors: &PluginErrorCounter,
        description: &str,
        mut operation: F,
    ) -> Result<(), PluginError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), PluginError>>,
    {
        let attempts = self.attempts.max(1);
        let mut failures = 0;

        loop {
            let error = match operation().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            failures += 1;
            errors.record();

            if failures >= attempts {
                return Err(error);
            }
            slog::warn!(
                logger,
                "Attempt {}/{} to {} failed: {}",
                failures,
                attempts,
                description,
                error
            );
            tokio::time::sleep(self.backoff.delay(failures)).await;
        }
    }
}

/// Total failed plugin attempts, mirrored into `entrance_plugin_errors_total`.
#[derive(Debug, Default)]
pub struct PluginErrorCounter(AtomicU64);

impl PluginErrorCounter {
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("entrance_plugin_errors_total").increment(1);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        // -- setup --
        let policy = RetryPolicy::default();
        let errors = PluginErrorCounter::default();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        // -- execute --
        let result = policy
            .run(&logger(), &errors, "add node", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(PluginError::Backend("busy".to_string()))
                } else {
                    Ok(())
                }
            })
            .await;

        // -- verify --
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(errors.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let policy = RetryPolicy::default();
        let errors = PluginErrorCounter::default();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = policy
            .run(&logger(), &errors, "add node", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err(PluginError::Backend(format!("failure {}", n)))
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(errors.get(), 3);
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(50),
        };

        assert_eq!(backoff.delay(1), Duration::from_millis(10));
        assert_eq!(backoff.delay(2), Duration::from_millis(20));
        assert_eq!(backoff.delay(3), Duration::from_millis(40));
        assert_eq!(backoff.delay(4), Duration::from_millis(50));
        assert_eq!(backoff.delay(40), Duration::from_millis(50));
        assert_eq!(Backoff::Fixed(Duration::from_millis(10)).delay(7), Duration::from_millis(10));
    }
}
