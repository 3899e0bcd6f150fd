use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::JudgeError;
use crate::leaderboard::models::Question;

/// A recent accepted submission as reported by the judge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeSubmission {
    pub id: String,
    /// Slug of the question the submission solves
    pub name: String,
    pub title: String,
    /// Unix seconds, as a decimal string
    pub timestamp: String,
}

impl JudgeSubmission {
    pub fn submitted_at(&self) -> Result<DateTime<Utc>, JudgeError> {
        parse_judge_timestamp(&self.timestamp)
    }
}

pub fn parse_judge_timestamp(raw: &str) -> Result<DateTime<Utc>, JudgeError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .ok_or_else(|| JudgeError::InvalidTimestamp(raw.to_string()))
}

/// Read-only view of the external coding judge
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn verify_user(&self, username: &str) -> Result<bool, JudgeError>;

    /// The currently active daily question
    async fn get_daily_question(&self) -> Result<Question, JudgeError>;

    /// Up to `limit` daily questions, newest first, starting from the given
    /// month and paging backward through earlier months as needed
    async fn list_daily_questions(
        &self,
        year: i32,
        month: u32,
        limit: usize,
    ) -> Result<Vec<Question>, JudgeError>;

    async fn get_recent_accepted_submissions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<JudgeSubmission>, JudgeError>;
}

/// Per-attempt timeout plus bounded, jittered exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, JudgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, JudgeError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(self.timeout, attempt_fn()).await {
                Ok(result) => result,
                Err(_) => Err(JudgeError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => {
                    warn!(operation, attempt, error = %error, "Judge request failed");
                    last_error = error.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(JudgeError::Unavailable {
            operation: operation.to_string(),
            attempts,
            last_error,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponential = self.base_delay.saturating_mul(1 << (attempt - 1).min(6));
        let jitter_ms = rand::rng().random_range(0..=self.base_delay.as_millis() as u64);
        exponential + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(1),
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn parses_unix_second_timestamps() {
        let parsed = parse_judge_timestamp("1690761600").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2023-07-31T00:00:00+00:00");
        assert!(matches!(
            parse_judge_timestamp("yesterday"),
            Err(JudgeError::InvalidTimestamp(_))
        ));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast_policy(3)
            .run("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(JudgeError::UnexpectedResponse("503".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast_policy(2)
            .run("down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(JudgeError::UnexpectedResponse("502".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(JudgeError::Unavailable { attempts: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_malformed_data() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast_policy(5)
            .run("bad", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(JudgeError::InvalidTimestamp("x".to_string()))
            })
            .await;

        assert!(matches!(result, Err(JudgeError::InvalidTimestamp(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_slow_attempts() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(10),
            max_attempts: 1,
            base_delay: Duration::ZERO,
        };
        let result: Result<(), _> = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(JudgeError::Unavailable { .. })));
    }
}
