use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::client::{JudgeClient, JudgeSubmission, RetryPolicy};
use super::JudgeError;
use crate::leaderboard::models::{Difficulty, Question};

pub const DEFAULT_BASE_URL: &str = "https://leetcode.com";

/// How far back `list_daily_questions` pages before settling for a short page
const MAX_MONTHS_SCANNED: usize = 12;

const DAILY_CHALLENGES_QUERY: &str = r#"
query dailyCodingQuestionRecords($year: Int!, $month: Int!) {
  dailyCodingChallengeV2(year: $year, month: $month) {
    challenges {
      date
      link
      question {
        questionFrontendId
        title
        titleSlug
        difficulty
      }
    }
  }
}
"#;

const ACTIVE_DAILY_QUERY: &str = r#"
query questionOfToday {
  activeDailyCodingChallengeQuestion {
    date
    link
    question {
      questionFrontendId
      title
      titleSlug
      difficulty
    }
  }
}
"#;

const RECENT_AC_SUBMISSIONS_QUERY: &str = r#"
query recentAcSubmissions($username: String!, $limit: Int!) {
  recentAcSubmissionList(username: $username, limit: $limit) {
    id
    title
    titleSlug
    timestamp
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyChallengeData {
    daily_coding_challenge_v2: DailyChallengeMonth,
}

#[derive(Debug, Deserialize)]
struct DailyChallengeMonth {
    challenges: Vec<Challenge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveDailyData {
    active_daily_coding_challenge_question: Challenge,
}

#[derive(Debug, Deserialize)]
struct Challenge {
    date: String,
    question: ChallengeQuestion,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeQuestion {
    question_frontend_id: String,
    title: String,
    title_slug: String,
    difficulty: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentSubmissionsData {
    recent_ac_submission_list: Vec<RecentSubmission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentSubmission {
    id: String,
    title: String,
    title_slug: String,
    timestamp: String,
}

pub fn question_url(base_url: &str, slug: &str) -> String {
    format!("{}/problems/{}/", base_url.trim_end_matches('/'), slug)
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// LeetCode GraphQL client
pub struct LeetCodeClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl LeetCodeClient {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self, JudgeError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lc-dailies/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn to_question(&self, challenge: Challenge) -> Result<Question, JudgeError> {
        let date = NaiveDate::parse_from_str(&challenge.date, "%Y-%m-%d").map_err(|e| {
            JudgeError::UnexpectedResponse(format!("bad challenge date {}: {}", challenge.date, e))
        })?;
        let difficulty: Difficulty = challenge.question.difficulty.parse().map_err(|_| {
            JudgeError::UnexpectedResponse(format!(
                "unknown difficulty {}",
                challenge.question.difficulty
            ))
        })?;

        Ok(Question {
            url: question_url(&self.base_url, &challenge.question.title_slug),
            name: challenge.question.title_slug,
            date,
            title: challenge.question.title,
            difficulty,
            number: challenge.question.question_frontend_id.parse().unwrap_or_default(),
        })
    }

    async fn gql<T: DeserializeOwned>(&self, body: Value) -> Result<T, JudgeError> {
        let response = self
            .http
            .post(format!("{}/graphql/", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JudgeError::UnexpectedResponse(format!("status {}", status)));
        }

        let parsed: GraphqlResponse<T> = response.json().await?;
        match parsed.data {
            Some(data) => Ok(data),
            None => Err(JudgeError::UnexpectedResponse(
                parsed
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
        }
    }

    async fn fetch_month(&self, year: i32, month: u32) -> Result<Vec<Challenge>, JudgeError> {
        let body = json!({
            "operationName": "dailyCodingQuestionRecords",
            "query": DAILY_CHALLENGES_QUERY,
            "variables": { "year": year, "month": month },
        });
        let data: DailyChallengeData = self
            .retry
            .run("list_daily_questions", || self.gql(body.clone()))
            .await?;
        Ok(data.daily_coding_challenge_v2.challenges)
    }
}

#[async_trait]
impl JudgeClient for LeetCodeClient {
    #[instrument(skip(self))]
    async fn verify_user(&self, username: &str) -> Result<bool, JudgeError> {
        let url = format!("{}/{}/", self.base_url, username);
        self.retry
            .run("verify_user", || async {
                let status = self.http.get(&url).send().await?.status();
                match status {
                    StatusCode::OK => Ok(true),
                    StatusCode::NOT_FOUND => Ok(false),
                    other => Err(JudgeError::UnexpectedResponse(format!("status {}", other))),
                }
            })
            .await
    }

    #[instrument(skip(self))]
    async fn get_daily_question(&self) -> Result<Question, JudgeError> {
        let body = json!({
            "operationName": "questionOfToday",
            "query": ACTIVE_DAILY_QUERY,
            "variables": {},
        });
        let data: ActiveDailyData = self
            .retry
            .run("get_daily_question", || self.gql(body.clone()))
            .await?;
        self.to_question(data.active_daily_coding_challenge_question)
    }

    #[instrument(skip(self))]
    async fn list_daily_questions(
        &self,
        year: i32,
        month: u32,
        limit: usize,
    ) -> Result<Vec<Question>, JudgeError> {
        let mut questions = Vec::with_capacity(limit);
        let (mut year, mut month) = (year, month);

        // Early in a month the anchor month has nothing posted yet, so
        // empty months are stepped over rather than ending the listing
        for _ in 0..MAX_MONTHS_SCANNED {
            if questions.len() >= limit {
                break;
            }

            let challenges = self.fetch_month(year, month).await?;
            if challenges.is_empty() {
                debug!(year, month, "No challenges listed for month");
            }

            for challenge in challenges.into_iter().rev() {
                if questions.len() == limit {
                    break;
                }
                match self.to_question(challenge) {
                    Ok(question) => questions.push(question),
                    Err(error) => warn!(error = %error, "Skipping unreadable challenge"),
                }
            }

            (year, month) = previous_month(year, month);
        }

        debug!(count = questions.len(), "Fetched daily questions");
        Ok(questions)
    }

    #[instrument(skip(self))]
    async fn get_recent_accepted_submissions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<JudgeSubmission>, JudgeError> {
        let body = json!({
            "operationName": "recentAcSubmissions",
            "query": RECENT_AC_SUBMISSIONS_QUERY,
            "variables": { "username": username, "limit": limit },
        });
        let data: RecentSubmissionsData = self
            .retry
            .run("get_recent_accepted_submissions", || self.gql(body.clone()))
            .await?;

        Ok(data
            .recent_ac_submission_list
            .into_iter()
            .map(|submission| JudgeSubmission {
                id: submission.id,
                name: submission.title_slug,
                title: submission.title,
                timestamp: submission.timestamp,
            })
            .collect())
    }
}
