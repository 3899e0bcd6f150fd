// Public API
pub use errors::LeaderboardError;
pub use handlers::router;
pub use models::{Difficulty, Player, Question, Season, SeasonSlot, SeasonStatus, Submission};
pub use repository::{PointerUpdate, SeasonRepository, Versioned};
pub use scheduler::{spawn_periodic_sync, sync_current_season};
pub use scores::{Rounding, ScoreCalculator, ScoreParams, TimeDecayCalculator};
pub use service::{LeaderboardService, LeaderboardServiceBuilder};
pub use sync::{merge_submissions, MergeReport, SyncEngine, SyncOptions};
pub use types::{RegisterRequest, RegisterResult, SyncQuery, SyncResult, UnregisterResult};

// Internal modules
mod errors;
mod handlers;
pub mod models;
pub mod repository;
mod scheduler;
pub mod scores;
pub mod service;
pub mod sync;
mod types;
