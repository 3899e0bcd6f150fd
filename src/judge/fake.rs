use async_trait::async_trait;
use chrono::Datelike;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::client::{JudgeClient, JudgeSubmission};
use super::JudgeError;
use crate::leaderboard::models::Question;

/// Scriptable in-process judge for development and tests
///
/// Question listings are newest first and, like the real listing, hold
/// nothing posted after the requested month. Usernames marked as failing
/// return `JudgeError::Unavailable`.
#[derive(Default)]
pub struct FakeJudgeClient {
    known_users: RwLock<HashSet<String>>,
    questions: RwLock<Vec<Question>>,
    submissions: RwLock<HashMap<String, Vec<JudgeSubmission>>>,
    failing_users: RwLock<HashSet<String>>,
    questions_unavailable: RwLock<bool>,
    requested_months: RwLock<Vec<(i32, u32)>>,
    submission_fetches: AtomicUsize,
}

impl FakeJudgeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, username: &str) -> Self {
        self.add_user(username);
        self
    }

    pub fn with_question(self, question: Question) -> Self {
        self.add_question(question);
        self
    }

    pub fn with_submission(self, username: &str, submission: JudgeSubmission) -> Self {
        self.add_submission(username, submission);
        self
    }

    pub fn add_user(&self, username: &str) {
        self.known_users.write().unwrap().insert(username.to_string());
    }

    /// Inserts a question keeping the page sorted newest first
    pub fn add_question(&self, question: Question) {
        let mut questions = self.questions.write().unwrap();
        questions.push(question);
        questions.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn add_submission(&self, username: &str, submission: JudgeSubmission) {
        self.submissions
            .write()
            .unwrap()
            .entry(username.to_string())
            .or_default()
            .insert(0, submission);
    }

    pub fn fail_user(&self, username: &str) {
        self.failing_users.write().unwrap().insert(username.to_string());
    }

    pub fn set_questions_unavailable(&self, unavailable: bool) {
        *self.questions_unavailable.write().unwrap() = unavailable;
    }

    /// (year, month) anchors of every question listing served so far
    pub fn requested_months(&self) -> Vec<(i32, u32)> {
        self.requested_months.read().unwrap().clone()
    }

    /// Number of submission fetches served so far
    pub fn submission_fetches(&self) -> usize {
        self.submission_fetches.load(Ordering::SeqCst)
    }
}

fn unavailable(operation: &str) -> JudgeError {
    JudgeError::Unavailable {
        operation: operation.to_string(),
        attempts: 1,
        last_error: "fake outage".to_string(),
    }
}

#[async_trait]
impl JudgeClient for FakeJudgeClient {
    async fn verify_user(&self, username: &str) -> Result<bool, JudgeError> {
        if self.failing_users.read().unwrap().contains(username) {
            return Err(unavailable("verify_user"));
        }
        Ok(self.known_users.read().unwrap().contains(username))
    }

    async fn get_daily_question(&self) -> Result<Question, JudgeError> {
        self.questions
            .read()
            .unwrap()
            .first()
            .cloned()
            .ok_or_else(|| JudgeError::UnexpectedResponse("no daily question".to_string()))
    }

    async fn list_daily_questions(
        &self,
        year: i32,
        month: u32,
        limit: usize,
    ) -> Result<Vec<Question>, JudgeError> {
        self.requested_months.write().unwrap().push((year, month));
        if *self.questions_unavailable.read().unwrap() {
            return Err(unavailable("list_daily_questions"));
        }
        Ok(self
            .questions
            .read()
            .unwrap()
            .iter()
            .filter(|question| (question.date.year(), question.date.month()) <= (year, month))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_recent_accepted_submissions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<JudgeSubmission>, JudgeError> {
        self.submission_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_users.read().unwrap().contains(username) {
            return Err(unavailable("get_recent_accepted_submissions"));
        }
        Ok(self
            .submissions
            .read()
            .unwrap()
            .get(username)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
