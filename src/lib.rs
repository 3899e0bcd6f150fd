// Library crate for the LeetCode dailies leaderboard
// This file exposes the public API for integration tests

pub mod clock;
pub mod config;
pub mod judge;
pub mod leaderboard;
pub mod shared;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use judge::{FakeJudgeClient, JudgeClient, LeetCodeClient};
pub use leaderboard::{LeaderboardError, LeaderboardService, Season};
pub use shared::{AppError, AppState};
pub use store::{InMemoryKvStore, KeyValueStore, PostgresKvStore};
