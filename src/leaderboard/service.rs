use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{
        season_id_for, week_start, Player, Players, Question, Season, SeasonSlot, SeasonStatus,
    },
    repository::{PointerUpdate, SeasonRepository},
    scores::{ScoreCalculator, TimeDecayCalculator},
    sync::{SyncEngine, SyncOptions},
    types::{RegisterResult, SyncResult, UnregisterResult},
    LeaderboardError,
};
use crate::clock::{Clock, SystemClock};
use crate::judge::JudgeClient;
use crate::store::{KeyValueStore, StoreError};

/// Public contract of the leaderboard: registration, sync and season queries
pub struct LeaderboardService {
    repository: SeasonRepository,
    judge: Arc<dyn JudgeClient>,
    engine: SyncEngine,
    clock: Arc<dyn Clock>,
    restart_offset: Duration,
}

impl LeaderboardService {
    pub fn builder(
        kv: Arc<dyn KeyValueStore>,
        judge: Arc<dyn JudgeClient>,
    ) -> LeaderboardServiceBuilder {
        LeaderboardServiceBuilder::new(kv, judge)
    }

    pub fn repository(&self) -> &SeasonRepository {
        &self.repository
    }

    #[instrument(skip(self))]
    pub async fn register(
        &self,
        player_id: &str,
        judge_username: &str,
    ) -> Result<RegisterResult, LeaderboardError> {
        let player = Player {
            id: player_id.to_string(),
            judge_username: judge_username.to_string(),
        };
        self.repository
            .register_player(player, self.judge.as_ref())
            .await?;
        Ok(RegisterResult { ok: true })
    }

    #[instrument(skip(self))]
    pub async fn unregister(&self, player_id: &str) -> Result<UnregisterResult, LeaderboardError> {
        self.repository.unregister_player(player_id).await?;
        Ok(UnregisterResult { ok: true })
    }

    /// Syncs `season_id` if given, otherwise the season covering
    /// `reference_date` (default now), creating it if needed. The latest
    /// pointer only moves to a season of the current week.
    #[instrument(skip(self))]
    pub async fn sync(
        &self,
        season_id: Option<&str>,
        reference_date: Option<DateTime<Utc>>,
    ) -> Result<SyncResult, LeaderboardError> {
        let now = self.clock.now();
        let reference = reference_date.unwrap_or(now);
        let current_start = week_start(now, self.restart_offset);
        let players = self.repository.list_players().await?;

        let season = match season_id {
            Some(id) => {
                let stored = self
                    .repository
                    .get_season(id)
                    .await?
                    .ok_or_else(|| LeaderboardError::SeasonNotFound(id.to_string()))?;

                let pointer = if stored.value.start_date == current_start {
                    self.advance_pointer().await?
                } else {
                    PointerUpdate::Keep
                };
                let slot = SeasonSlot::Stored {
                    season: stored.value,
                    version: stored.version,
                };
                self.reconcile(slot, &players, reference, pointer).await?
            }
            None => {
                let target_start = week_start(reference, self.restart_offset);
                self.finalize_stale_latest(target_start, &players, reference)
                    .await?;

                let pointer = if target_start == current_start {
                    self.advance_pointer().await?
                } else {
                    PointerUpdate::Keep
                };
                let slot = self.slot_for(target_start).await?;
                self.reconcile(slot, &players, reference, pointer).await?
            }
        };

        Ok(SyncResult { season })
    }

    #[instrument(skip(self))]
    pub async fn get_season(&self, season_id: &str) -> Result<Option<Season>, LeaderboardError> {
        Ok(self
            .repository
            .get_season(season_id)
            .await?
            .map(|season| season.value))
    }

    #[instrument(skip(self))]
    pub async fn get_latest_season(&self) -> Result<Option<Season>, LeaderboardError> {
        Ok(self
            .repository
            .get_latest_season()
            .await?
            .map(|season| season.value))
    }

    #[instrument(skip(self))]
    pub async fn list_seasons(&self) -> Result<Vec<Season>, LeaderboardError> {
        Ok(self.repository.list_seasons().await?)
    }

    /// Today's daily question straight from the judge
    #[instrument(skip(self))]
    pub async fn daily_question(&self) -> Result<Question, LeaderboardError> {
        Ok(self.judge.get_daily_question().await?)
    }

    async fn advance_pointer(&self) -> Result<PointerUpdate, LeaderboardError> {
        let observed = self.repository.get_latest_pointer().await?;
        Ok(PointerUpdate::Advance {
            expected: observed.map(|pointer| pointer.version),
        })
    }

    async fn slot_for(&self, start_date: DateTime<Utc>) -> Result<SeasonSlot, LeaderboardError> {
        let slot = match self.repository.get_season(&season_id_for(start_date)).await? {
            Some(stored) => SeasonSlot::Stored {
                season: stored.value,
                version: stored.version,
            },
            None => SeasonSlot::Vacant { start_date },
        };
        Ok(slot)
    }

    /// Gives the previous latest season one last pass before a newer week
    /// takes over, so submissions from its final hours are not lost.
    async fn finalize_stale_latest(
        &self,
        target_start: DateTime<Utc>,
        players: &Players,
        reference: DateTime<Utc>,
    ) -> Result<(), LeaderboardError> {
        let Some(pointer) = self.repository.get_latest_pointer().await? else {
            return Ok(());
        };
        let stored = self
            .repository
            .get_season(&pointer.value)
            .await?
            .ok_or_else(|| StoreError::DanglingPointer(pointer.value.clone()))?;

        if stored.value.start_date >= target_start {
            return Ok(());
        }

        info!(season_id = %stored.value.id, "Finalizing previous season");
        let slot = SeasonSlot::Stored {
            season: stored.value,
            version: stored.version,
        };
        self.reconcile(slot, players, reference, PointerUpdate::Keep)
            .await?;
        Ok(())
    }

    async fn reconcile(
        &self,
        slot: SeasonSlot,
        players: &Players,
        reference: DateTime<Utc>,
        pointer: PointerUpdate,
    ) -> Result<Season, LeaderboardError> {
        let expected = slot.expected_version();
        let season = slot.into_season();
        let status_before = season.status();
        let mut season = self.engine.sync(season, players).await?;
        season.synced_at = Some(reference);

        self.repository
            .put_season(&season, expected, pointer)
            .await
            .map_err(|error| {
                warn!(season_id = %season.id, error = %error, "Sync result not stored");
                LeaderboardError::from(error)
            })?;

        if status_before == SeasonStatus::Empty && season.status() == SeasonStatus::Populated {
            info!(season_id = %season.id, "Season recorded its first submissions");
        }
        info!(season_id = %season.id, "Season synced");
        Ok(season)
    }
}

pub struct LeaderboardServiceBuilder {
    kv: Arc<dyn KeyValueStore>,
    judge: Arc<dyn JudgeClient>,
    calculator: Arc<dyn ScoreCalculator>,
    clock: Arc<dyn Clock>,
    sync_options: SyncOptions,
    restart_offset: Duration,
}

impl LeaderboardServiceBuilder {
    pub fn new(kv: Arc<dyn KeyValueStore>, judge: Arc<dyn JudgeClient>) -> Self {
        Self {
            kv,
            judge,
            calculator: Arc::new(TimeDecayCalculator::default()),
            clock: Arc::new(SystemClock),
            sync_options: SyncOptions::default(),
            restart_offset: Duration::zero(),
        }
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn ScoreCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.sync_options = options;
        self
    }

    pub fn with_restart_offset(mut self, offset: Duration) -> Self {
        self.restart_offset = offset;
        self
    }

    pub fn build(self) -> LeaderboardService {
        LeaderboardService {
            repository: SeasonRepository::new(self.kv),
            engine: SyncEngine::new(self.judge.clone(), self.calculator, self.sync_options),
            judge: self.judge,
            clock: self.clock,
            restart_offset: self.restart_offset,
        }
    }
}
