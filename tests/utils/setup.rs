use chrono::{DateTime, Utc};
use std::sync::Arc;

use lc_dailies::{
    clock::FixedClock,
    judge::FakeJudgeClient,
    leaderboard::{models::Question, LeaderboardService},
    store::{InMemoryKvStore, KeyValueStore},
};

use super::yielding::YieldingKvStore;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub service: Arc<LeaderboardService>,
    pub judge: Arc<FakeJudgeClient>,
    pub clock: Arc<FixedClock>,
    pub kv: Arc<InMemoryKvStore>,
}

pub struct TestSetupBuilder {
    now: DateTime<Utc>,
    players: Vec<(String, String)>,
    questions: Vec<Question>,
    yielding_store: bool,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            now: super::at(2023, 8, 30, 12, 0),
            players: vec![],
            questions: vec![],
            yielding_store: false,
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Players are registered as `<id>_lc` on the judge
    pub fn with_players(mut self, ids: Vec<&str>) -> Self {
        self.players = ids
            .into_iter()
            .map(|id| (id.to_string(), format!("{}_lc", id)))
            .collect();
        self
    }

    pub fn with_two_players(self) -> Self {
        self.with_players(vec!["alice", "bob"])
    }

    pub fn with_question(mut self, question: Question) -> Self {
        self.questions.push(question);
        self
    }

    /// Store operations yield first, so concurrent calls interleave
    pub fn with_yielding_store(mut self) -> Self {
        self.yielding_store = true;
        self
    }

    pub async fn build(self) -> TestSetup {
        let judge = Arc::new(FakeJudgeClient::new());
        let clock = Arc::new(FixedClock::new(self.now));
        let kv = Arc::new(InMemoryKvStore::new());

        for question in self.questions {
            judge.add_question(question);
        }
        for (_, username) in &self.players {
            judge.add_user(username);
        }

        let store: Arc<dyn KeyValueStore> = if self.yielding_store {
            Arc::new(YieldingKvStore::new(kv.clone()))
        } else {
            kv.clone()
        };
        let service = Arc::new(
            LeaderboardService::builder(store, judge.clone())
                .with_clock(clock.clone())
                .build(),
        );

        for (id, username) in &self.players {
            service
                .register(id, username)
                .await
                .expect("registering a known judge user should succeed");
        }

        TestSetup {
            service,
            judge,
            clock,
            kv,
        }
    }
}
