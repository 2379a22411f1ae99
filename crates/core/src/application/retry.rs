// Retry policy for handler failures
//
// Default policy never retries: a failed enable/disable becomes the task's
// FAIL state. Deployments opt in per handler failure code.
use crate::application::component_manager::ComponentError;
use crate::application::executor::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS,
};
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the operation again after the given delay in ms
    Retry(i64),
    /// Give up, the task fails with the last error
    Failed,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: i64,
    backoff_factor: f64,
    retryable_codes: Vec<i32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    /// # Arguments
    /// * `max_attempts` - Total attempts including the first one (min 1)
    /// * `base_delay_ms` - Delay before the first retry
    /// * `backoff_factor` - Multiplier applied per further attempt
    /// * `retryable_codes` - Handler failure codes worth another attempt
    pub fn new(
        max_attempts: u32,
        base_delay_ms: i64,
        backoff_factor: f64,
        retryable_codes: Vec<i32>,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(0),
            backoff_factor,
            retryable_codes,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_RETRY_BASE_DELAY_MS,
            DEFAULT_BACKOFF_FACTOR,
            Vec::new(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed
    ///
    /// Backoff: delay = base_delay * backoff_factor ^ (attempt - 1), with a
    /// ±10% jitter seeded by the task id so that retries of tasks started
    /// together spread out.
    pub fn should_retry(&self, task_id: &str, attempt: u32, err: &ComponentError) -> RetryDecision {
        let code = match err {
            ComponentError::Handler { source, .. } => source.code,
            // resolution failures will not change on their own
            _ => return RetryDecision::Failed,
        };

        if !self.retryable_codes.contains(&code) {
            return RetryDecision::Failed;
        }

        if attempt >= self.max_attempts {
            warn!(
                task_id = %task_id,
                attempts = %attempt,
                max_attempts = %self.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed;
        }

        let exponent = attempt.saturating_sub(1) as i32;
        let base_delay_ms = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);

        let jitter_seed = task_id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay_ms = (base_delay_ms * jitter_factor) as i64;

        info!(
            task_id = %task_id,
            attempt = %attempt,
            code = %code,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DhType;
    use crate::port::HandlerError;

    fn handler_err(code: i32) -> ComponentError {
        ComponentError::Handler {
            dh_type: DhType::Camera,
            source: HandlerError::new(code, "busy"),
        }
    }

    #[test]
    fn test_default_never_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.should_retry("t1", 1, &handler_err(-1)), RetryDecision::Failed);
    }

    #[test]
    fn test_listed_code_is_retried_with_backoff() {
        let policy = RetryPolicy::new(3, 100, 2.0, vec![-16]);

        let first = match policy.should_retry("t1", 1, &handler_err(-16)) {
            RetryDecision::Retry(d) => d,
            RetryDecision::Failed => panic!("expected retry"),
        };
        let second = match policy.should_retry("t1", 2, &handler_err(-16)) {
            RetryDecision::Retry(d) => d,
            RetryDecision::Failed => panic!("expected retry"),
        };
        assert!((90..=110).contains(&first));
        assert!((180..=220).contains(&second));
        assert_eq!(policy.should_retry("t1", 3, &handler_err(-16)), RetryDecision::Failed);
    }

    #[test]
    fn test_unlisted_code_is_not_retried() {
        let policy = RetryPolicy::new(5, 100, 2.0, vec![-16]);
        assert_eq!(policy.should_retry("t1", 1, &handler_err(-2)), RetryDecision::Failed);
    }

    #[test]
    fn test_resolution_failures_are_not_retried() {
        let policy = RetryPolicy::new(5, 100, 2.0, vec![crate::error::code::NOT_SUPPORTED]);
        assert_eq!(
            policy.should_retry("t1", 1, &ComponentError::NotSupported(DhType::Gps)),
            RetryDecision::Failed
        );
    }

    #[test]
    fn test_jitter_is_deterministic_per_task() {
        let policy = RetryPolicy::new(2, 1000, 2.0, vec![7]);
        assert_eq!(
            policy.should_retry("abc", 1, &handler_err(7)),
            policy.should_retry("abc", 1, &handler_err(7))
        );
    }
}
