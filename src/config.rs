use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::judge::{RetryPolicy, DEFAULT_BASE_URL};
use crate::leaderboard::{ScoreParams, SyncOptions};

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Postgres connection string; the in-memory store is used when unset
    /// Env: DATABASE_URL (optional)
    pub database_url: Option<String>,

    /// Shift applied to the Sunday 00:00 UTC week boundary
    /// Env: RESTART_OFFSET_SECS (default: 0)
    pub restart_offset: chrono::Duration,

    /// Env: SCORE_HIGHEST (default: 100)
    pub score_highest: i32,

    /// Env: SCORE_LOWEST (default: 50)
    pub score_lowest: i32,

    /// Env: SCORE_DURATION_SECS (default: 86400)
    pub score_duration: chrono::Duration,

    /// Env: QUESTIONS_FETCH_AMOUNT (default: 10)
    pub questions_fetch_amount: usize,

    /// Env: SUBMISSIONS_FETCH_AMOUNT (default: 20)
    pub submissions_fetch_amount: usize,

    /// Env: JUDGE_BASE_URL (default: https://leetcode.com)
    pub judge_base_url: String,

    /// Per-attempt timeout for judge calls
    /// Env: JUDGE_TIMEOUT_SECS (default: 10)
    pub judge_timeout: Duration,

    /// Env: JUDGE_MAX_ATTEMPTS (default: 3)
    pub judge_max_attempts: u32,

    /// Env: JUDGE_RETRY_BASE_DELAY_MS (default: 250)
    pub judge_retry_base_delay: Duration,

    /// Period of the background sync, `None` disables it
    /// Env: SYNC_INTERVAL_SECS (default: 3600, 0 disables)
    pub sync_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv();
        let sync_interval_secs: u64 = env_or_default("SYNC_INTERVAL_SECS", 3600);
        Self {
            port: env_or_default("PORT", 3000),
            database_url: var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            restart_offset: chrono::Duration::seconds(env_or_default("RESTART_OFFSET_SECS", 0)),
            score_highest: env_or_default("SCORE_HIGHEST", 100),
            score_lowest: env_or_default("SCORE_LOWEST", 50),
            score_duration: chrono::Duration::seconds(env_or_default("SCORE_DURATION_SECS", 86400)),
            questions_fetch_amount: env_or_default("QUESTIONS_FETCH_AMOUNT", 10),
            submissions_fetch_amount: env_or_default("SUBMISSIONS_FETCH_AMOUNT", 20),
            judge_base_url: env_or_default_string("JUDGE_BASE_URL", DEFAULT_BASE_URL),
            judge_timeout: Duration::from_secs(env_or_default("JUDGE_TIMEOUT_SECS", 10)),
            judge_max_attempts: env_or_default("JUDGE_MAX_ATTEMPTS", 3),
            judge_retry_base_delay: Duration::from_millis(env_or_default(
                "JUDGE_RETRY_BASE_DELAY_MS",
                250,
            )),
            sync_interval: (sync_interval_secs > 0)
                .then(|| Duration::from_secs(sync_interval_secs)),
        }
    }

    pub fn score_params(&self) -> ScoreParams {
        ScoreParams {
            possible_highest_score: self.score_highest,
            possible_lowest_score: self.score_lowest,
            duration: self.score_duration,
            ..ScoreParams::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.judge_timeout,
            max_attempts: self.judge_max_attempts,
            base_delay: self.judge_retry_base_delay,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            questions_fetch_amount: self.questions_fetch_amount,
            submissions_fetch_amount: self.submissions_fetch_amount,
            ..SyncOptions::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            restart_offset: chrono::Duration::zero(),
            score_highest: 100,
            score_lowest: 50,
            score_duration: chrono::Duration::days(1),
            questions_fetch_amount: 10,
            submissions_fetch_amount: 20,
            judge_base_url: DEFAULT_BASE_URL.to_string(),
            judge_timeout: Duration::from_secs(10),
            judge_max_attempts: 3,
            judge_retry_base_delay: Duration::from_millis(250),
            sync_interval: Some(Duration::from_secs(3600)),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed
fn env_or_default<T: FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
