// Public API
pub use client::{parse_judge_timestamp, JudgeClient, JudgeSubmission, RetryPolicy};
pub use errors::JudgeError;
pub use fake::FakeJudgeClient;
pub use leetcode::{question_url, LeetCodeClient, DEFAULT_BASE_URL};

// Internal modules
mod client;
mod errors;
mod fake;
mod leetcode;
