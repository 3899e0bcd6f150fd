use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

use crate::store::Version;

/// Length of a season's scoring window
pub fn season_length() -> Duration {
    Duration::weeks(1)
}

/// A judge account linked to an internal identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub judge_username: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One day's coding challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique slug, e.g. "two-sum"
    pub name: String,
    pub date: NaiveDate,
    pub title: String,
    pub difficulty: Difficulty,
    pub url: String,
    #[serde(default)]
    pub number: u32,
}

impl Question {
    /// Questions are posted at 00:00 UTC of their date
    pub fn posted_at(&self) -> DateTime<Utc> {
        self.date.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

/// Earliest accepted submission by a player for a question within a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub judge_submission_id: String,
    pub date: DateTime<Utc>,
}

pub type Players = BTreeMap<String, Player>;
pub type Questions = BTreeMap<String, Question>;
/// player id -> question name -> submission
pub type Submissions = BTreeMap<String, BTreeMap<String, Submission>>;
pub type Scores = BTreeMap<String, i32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonStatus {
    Empty,
    Populated,
}

/// Aggregate root: one 7-day scoring window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: String,
    pub start_date: DateTime<Utc>,
    pub players: Players,
    pub questions: Questions,
    pub submissions: Submissions,
    pub scores: Scores,
    pub synced_at: Option<DateTime<Utc>>,
}

impl Season {
    /// Creates an empty season starting at `start_date`
    pub fn empty(start_date: DateTime<Utc>) -> Self {
        Self {
            id: season_id_for(start_date),
            start_date,
            players: Players::new(),
            questions: Questions::new(),
            submissions: Submissions::new(),
            scores: Scores::new(),
            synced_at: None,
        }
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.start_date + season_length()
    }

    /// Whether `instant` lies in `[start_date, end_date)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_date && instant < self.end_date()
    }

    pub fn status(&self) -> SeasonStatus {
        if self.players.is_empty() && self.questions.is_empty() && self.submissions.is_empty() {
            SeasonStatus::Empty
        } else {
            SeasonStatus::Populated
        }
    }

    pub fn submission(&self, player_id: &str, question_name: &str) -> Option<&Submission> {
        self.submissions
            .get(player_id)
            .and_then(|by_question| by_question.get(question_name))
    }
}

/// Where a sync pass will write: a week with no stored season yet, or a
/// stored season together with the version it was read at.
#[derive(Debug, Clone)]
pub enum SeasonSlot {
    Vacant { start_date: DateTime<Utc> },
    Stored { season: Season, version: Version },
}

impl SeasonSlot {
    /// Version the write must be conditioned on; `None` means "must not exist"
    pub fn expected_version(&self) -> Option<Version> {
        match self {
            SeasonSlot::Vacant { .. } => None,
            SeasonSlot::Stored { version, .. } => Some(*version),
        }
    }

    pub fn into_season(self) -> Season {
        match self {
            SeasonSlot::Vacant { start_date } => Season::empty(start_date),
            SeasonSlot::Stored { season, .. } => season,
        }
    }
}

/// Start of the season containing `reference`.
///
/// Weeks begin at 00:00 UTC on Sunday shifted forward by `restart_offset`.
/// The offset is taken modulo one week, so negative or oversized offsets
/// still yield a season containing `reference`.
pub fn week_start(reference: DateTime<Utc>, restart_offset: Duration) -> DateTime<Utc> {
    let midnight = reference.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    let days_since_sunday = i64::from(reference.weekday().num_days_from_sunday());
    let mut start = midnight - Duration::days(days_since_sunday) + normalize_offset(restart_offset);
    if start > reference {
        start -= season_length();
    }
    start
}

fn normalize_offset(offset: Duration) -> Duration {
    let week = season_length().num_seconds();
    Duration::seconds(offset.num_seconds().rem_euclid(week))
}

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Deterministic, lexicographically sortable season id: a ULID whose time
/// component is the start instant and whose random component is zero.
pub fn season_id_for(start_date: DateTime<Utc>) -> String {
    let millis = start_date.timestamp_millis().max(0) as u64 & 0xFFFF_FFFF_FFFF;
    let mut time_part = [b'0'; 10];
    let mut rest = millis;
    for slot in time_part.iter_mut().rev() {
        *slot = CROCKFORD[(rest & 0x1F) as usize];
        rest >>= 5;
    }

    let mut id = String::with_capacity(26);
    id.extend(time_part.iter().map(|&byte| byte as char));
    id.push_str(&"0".repeat(16));
    id
}
