use chrono::Duration;

use super::models::{Players, Question, Questions, Scores, Submission, Submissions};

/// How a fractional score is turned into points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    #[default]
    Ceil,
    Floor,
    Nearest,
}

impl Rounding {
    fn apply(self, score: f64) -> i32 {
        let rounded = match self {
            Rounding::Ceil => score.ceil(),
            Rounding::Floor => score.floor(),
            Rounding::Nearest => score.round(),
        };
        rounded as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreParams {
    /// Points for a submission at the question's posting instant
    pub possible_highest_score: i32,
    /// Points once `duration` or more has elapsed
    pub possible_lowest_score: i32,
    /// Time it takes to decay from highest to lowest
    pub duration: Duration,
    pub rounding: Rounding,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            possible_highest_score: 100,
            possible_lowest_score: 50,
            duration: Duration::days(1),
            rounding: Rounding::Ceil,
        }
    }
}

pub trait ScoreCalculator: Send + Sync {
    fn score_of(&self, submission: &Submission, question: &Question) -> i32;

    /// Sum of `score_of` over every recorded submission of the player.
    /// Submissions whose question is missing from `questions` count nothing.
    fn score_of_player(
        &self,
        player_id: &str,
        questions: &Questions,
        submissions: &Submissions,
    ) -> i32 {
        let Some(by_question) = submissions.get(player_id) else {
            return 0;
        };

        by_question
            .iter()
            .filter_map(|(name, submission)| {
                questions
                    .get(name)
                    .map(|question| self.score_of(submission, question))
            })
            .sum()
    }

    /// Scores of every known player. Players scoring zero are omitted.
    fn scores_of(&self, players: &Players, questions: &Questions, submissions: &Submissions) -> Scores {
        players
            .keys()
            .filter_map(|player_id| {
                let score = self.score_of_player(player_id, questions, submissions);
                (score > 0).then(|| (player_id.clone(), score))
            })
            .collect()
    }
}

/// Linear decay from the highest to the lowest score over `duration`,
/// measured from the question's posting instant.
#[derive(Debug, Clone, Default)]
pub struct TimeDecayCalculator {
    params: ScoreParams,
}

impl TimeDecayCalculator {
    pub fn new(params: ScoreParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoreParams {
        &self.params
    }
}

impl ScoreCalculator for TimeDecayCalculator {
    fn score_of(&self, submission: &Submission, question: &Question) -> i32 {
        let elapsed = (submission.date - question.posted_at()).num_milliseconds() as f64;
        let window = self.params.duration.num_milliseconds() as f64;
        let progress = if window > 0.0 {
            (elapsed / window).clamp(0.0, 1.0)
        } else if elapsed > 0.0 {
            1.0
        } else {
            0.0
        };

        let highest = f64::from(self.params.possible_highest_score);
        let lowest = f64::from(self.params.possible_lowest_score);
        let score = highest - (highest - lowest) * progress;
        self.params.rounding.apply(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::models::{Difficulty, Player};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn question(name: &str) -> Question {
        Question {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 8, 28).unwrap(),
            title: "Two Sum".to_string(),
            difficulty: Difficulty::Easy,
            url: format!("https://leetcode.com/problems/{}/", name),
            number: 1,
        }
    }

    fn submission_after(minutes: i64) -> Submission {
        let posted = Utc.with_ymd_and_hms(2023, 8, 28, 0, 0, 0).unwrap();
        Submission {
            judge_submission_id: "1".to_string(),
            date: posted + Duration::minutes(minutes),
        }
    }

    #[rstest]
    #[case::at_posting(0, 100)]
    #[case::three_hours(180, 94)]
    #[case::half_day(720, 75)]
    #[case::full_day(1440, 50)]
    #[case::two_days(2880, 50)]
    #[case::before_posting(-60, 100)]
    fn decays_linearly_with_ceiling(#[case] minutes: i64, #[case] expected: i32) {
        let calculator = TimeDecayCalculator::default();
        assert_eq!(calculator.score_of(&submission_after(minutes), &question("two-sum")), expected);
    }

    #[test]
    fn honours_custom_params() {
        let calculator = TimeDecayCalculator::new(ScoreParams {
            possible_highest_score: 10,
            possible_lowest_score: 0,
            duration: Duration::hours(10),
            rounding: Rounding::Floor,
        });
        // 2.5h of 10h elapsed -> 7.5 -> floor 7
        assert_eq!(calculator.score_of(&submission_after(150), &question("two-sum")), 7);
    }

    #[test]
    fn player_score_sums_known_questions_only() {
        let calculator = TimeDecayCalculator::default();
        let questions: Questions = [("two-sum".to_string(), question("two-sum"))].into();
        let submissions: Submissions = [(
            "p1".to_string(),
            BTreeMap::from([
                ("two-sum".to_string(), submission_after(0)),
                ("unknown".to_string(), submission_after(0)),
            ]),
        )]
        .into();

        assert_eq!(calculator.score_of_player("p1", &questions, &submissions), 100);
        assert_eq!(calculator.score_of_player("p2", &questions, &submissions), 0);
    }

    #[test]
    fn scores_omit_zero_scorers() {
        let calculator = TimeDecayCalculator::default();
        let players: Players = ["p1", "p2"]
            .into_iter()
            .map(|id| {
                (
                    id.to_string(),
                    Player {
                        id: id.to_string(),
                        judge_username: format!("{}-lc", id),
                    },
                )
            })
            .collect();
        let questions: Questions = [("two-sum".to_string(), question("two-sum"))].into();
        let submissions: Submissions = [(
            "p1".to_string(),
            BTreeMap::from([("two-sum".to_string(), submission_after(720))]),
        )]
        .into();

        let scores = calculator.scores_of(&players, &questions, &submissions);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get("p1"), Some(&75));
        assert!(!scores.contains_key("p2"));
    }
}
