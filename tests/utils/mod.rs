pub mod setup;
pub mod yielding;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lc_dailies::judge::JudgeSubmission;
use lc_dailies::leaderboard::models::{Difficulty, Question};

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn question(name: &str, y: i32, m: u32, d: u32) -> Question {
    Question {
        name: name.to_string(),
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        title: name.replace('-', " "),
        difficulty: Difficulty::Medium,
        url: format!("https://leetcode.com/problems/{}/", name),
        number: 0,
    }
}

pub fn accepted(id: &str, name: &str, submitted_at: DateTime<Utc>) -> JudgeSubmission {
    JudgeSubmission {
        id: id.to_string(),
        name: name.to_string(),
        title: name.replace('-', " "),
        timestamp: submitted_at.timestamp().to_string(),
    }
}
