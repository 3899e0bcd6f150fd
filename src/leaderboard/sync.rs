use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::{stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{Player, Players, Question, Season, Submission};
use super::scores::ScoreCalculator;
use super::LeaderboardError;
use crate::judge::{JudgeClient, JudgeError, JudgeSubmission};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Size of the daily-question page used to validate new questions
    pub questions_fetch_amount: usize,
    /// How many recent accepted submissions to pull per player
    pub submissions_fetch_amount: usize,
    /// Player submission fetches in flight at once
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            questions_fetch_amount: 10,
            submissions_fetch_amount: 20,
            concurrency: 4,
        }
    }
}

/// Outcome of merging one player's judge submissions into a season
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub recorded: usize,
    pub skipped_not_earliest: usize,
    pub skipped_out_of_window: usize,
    pub skipped_unknown_question: usize,
    pub skipped_bad_timestamp: usize,
}

/// Merges one player's recent submissions into `season`.
///
/// The earliest submission per (player, question) wins, submissions outside
/// the season window are dropped, and a question not yet in the season is
/// only admitted when it appears on `question_page` dated inside the window.
pub fn merge_submissions(
    season: &mut Season,
    player: &Player,
    submissions: &[JudgeSubmission],
    question_page: &[Question],
) -> MergeReport {
    let mut report = MergeReport::default();

    for judge_submission in submissions {
        let submitted_at = match judge_submission.submitted_at() {
            Ok(instant) => instant,
            Err(error) => {
                warn!(player_id = %player.id, error = %error, "Skipping submission");
                report.skipped_bad_timestamp += 1;
                continue;
            }
        };
        let question_name = judge_submission.name.as_str();

        if let Some(stored) = season.submission(&player.id, question_name) {
            if stored.date < submitted_at {
                report.skipped_not_earliest += 1;
                continue;
            }
        }

        if !season.contains(submitted_at) {
            report.skipped_out_of_window += 1;
            continue;
        }

        if !season.questions.contains_key(question_name) {
            let Some(question) = question_page.iter().find(|q| q.name == question_name) else {
                report.skipped_unknown_question += 1;
                continue;
            };
            if !season.contains(question.posted_at()) {
                report.skipped_out_of_window += 1;
                continue;
            }
            season
                .questions
                .insert(question.name.clone(), question.clone());
        }

        season
            .submissions
            .entry(player.id.clone())
            .or_default()
            .insert(
                question_name.to_string(),
                Submission {
                    judge_submission_id: judge_submission.id.clone(),
                    date: submitted_at,
                },
            );
        season
            .players
            .entry(player.id.clone())
            .or_insert_with(|| player.clone());
        report.recorded += 1;
    }

    report
}

/// Days from `instant`'s date to the end of its month, inclusive
fn trailing_days_in_month(instant: DateTime<Utc>) -> usize {
    let date = instant.date_naive();
    let next_month = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    next_month
        .map(|first| (first - date).num_days().max(0) as usize)
        .unwrap_or(0)
}

/// Reconciles a season against the judge's current view
pub struct SyncEngine {
    judge: Arc<dyn JudgeClient>,
    calculator: Arc<dyn ScoreCalculator>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        judge: Arc<dyn JudgeClient>,
        calculator: Arc<dyn ScoreCalculator>,
        options: SyncOptions,
    ) -> Self {
        Self {
            judge,
            calculator,
            options,
        }
    }

    /// Runs one reconciliation pass and returns the updated season; the
    /// caller persists it. A player whose submissions can't be fetched is
    /// skipped for this pass. Failing to fetch the question page aborts.
    #[instrument(skip(self, season, players), fields(season_id = %season.id, players = players.len()))]
    pub async fn sync(&self, mut season: Season, players: &Players) -> Result<Season, LeaderboardError> {
        // The listing pages backward in time, so anchor it at the season's end
        // and widen it by the days of that month that fall after the season
        let end = season.end_date();
        let page_size = self.options.questions_fetch_amount + trailing_days_in_month(end);
        let question_page = self
            .judge
            .list_daily_questions(end.year(), end.month(), page_size)
            .await
            .map_err(|error| {
                warn!(error = %error, "Could not fetch daily questions");
                LeaderboardError::UpstreamUnavailable(error)
            })?;
        debug!(questions = question_page.len(), "Fetched question page");

        // Owned players and judge handle keep the fan-out future `Send`
        let limit = self.options.submissions_fetch_amount;
        let roster: Vec<Player> = players.values().cloned().collect();
        let judge = Arc::clone(&self.judge);
        let fetched: Vec<(Player, Result<Vec<JudgeSubmission>, JudgeError>)> = stream::iter(roster)
            .map(move |player| {
                let judge = Arc::clone(&judge);
                async move {
                    let result = judge
                        .get_recent_accepted_submissions(&player.judge_username, limit)
                        .await;
                    (player, result)
                }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut skipped_players = 0;
        for (player, result) in fetched {
            match result {
                Ok(submissions) => {
                    let report = merge_submissions(&mut season, &player, &submissions, &question_page);
                    debug!(player_id = %player.id, ?report, "Merged player submissions");
                }
                Err(error) => {
                    warn!(player_id = %player.id, error = %error, "Skipping player for this pass");
                    skipped_players += 1;
                }
            }
        }

        season.scores = self
            .calculator
            .scores_of(&season.players, &season.questions, &season.submissions);

        info!(
            questions = season.questions.len(),
            scored_players = season.scores.len(),
            skipped_players,
            "Season reconciled"
        );
        Ok(season)
    }
}
