use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{Player, Players, Season};
use super::LeaderboardError;
use crate::judge::JudgeClient;
use crate::store::{AtomicWrite, Entry, Key, KeyValueStore, Namespace, StoreError, Version};

/// A decoded value together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// What a season write does to the latest-season pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerUpdate {
    /// Leave the pointer alone
    Keep,
    /// Point at the written season, provided the pointer is still at `expected`
    Advance { expected: Option<Version> },
}

fn decode<T: DeserializeOwned>(entry: Entry) -> Result<Versioned<T>, StoreError> {
    Ok(Versioned {
        value: serde_json::from_value(entry.value)?,
        version: entry.version,
    })
}

/// Typed storage for players and seasons on top of a key-value backend
#[derive(Clone)]
pub struct SeasonRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl SeasonRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    #[instrument(skip(self))]
    pub async fn get_player(&self, player_id: &str) -> Result<Option<Versioned<Player>>, StoreError> {
        self.kv
            .get(&Key::player(player_id))
            .await?
            .map(decode)
            .transpose()
    }

    #[instrument(skip(self))]
    pub async fn list_players(&self) -> Result<Players, StoreError> {
        let mut players = Players::new();
        for (_, entry) in self.kv.list(Namespace::Players).await? {
            let player: Versioned<Player> = decode(entry)?;
            players.insert(player.value.id.clone(), player.value);
        }
        debug!(count = players.len(), "Listed registered players");
        Ok(players)
    }

    /// Observe, verify with the judge, then create iff still absent.
    /// Of two racing registrations for one id exactly one commits.
    #[instrument(skip(self, player, judge), fields(player_id = %player.id, judge_username = %player.judge_username))]
    pub async fn register_player(
        &self,
        player: Player,
        judge: &dyn JudgeClient,
    ) -> Result<(), LeaderboardError> {
        let key = Key::player(&player.id);
        if self.kv.get(&key).await?.is_some() {
            debug!("Player already registered");
            return Err(LeaderboardError::AlreadyRegistered(player.id));
        }

        match judge.verify_user(&player.judge_username).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Judge account not found");
                return Err(LeaderboardError::VerificationFailed(player.judge_username));
            }
            Err(error) => {
                warn!(error = %error, "Judge verification unavailable");
                return Err(LeaderboardError::UpstreamUnavailable(error));
            }
        }

        let value = serde_json::to_value(&player).map_err(StoreError::from)?;
        let write = AtomicWrite::new()
            .check(key.clone(), None)
            .set(key.clone(), value);

        match self.kv.commit(write).await {
            Ok(_) => {
                info!("Player registered");
                Ok(())
            }
            Err(error) if error.is_conflict() => {
                if self.kv.get(&key).await?.is_some() {
                    warn!("Lost registration race");
                    Err(LeaderboardError::AlreadyRegistered(player.id))
                } else {
                    Err(error.into())
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Deletes the player record. Past seasons keep their snapshot of the player.
    #[instrument(skip(self))]
    pub async fn unregister_player(&self, player_id: &str) -> Result<(), LeaderboardError> {
        let key = Key::player(player_id);
        let Some(entry) = self.kv.get(&key).await? else {
            return Err(LeaderboardError::NotRegistered(player_id.to_string()));
        };

        let write = AtomicWrite::new()
            .check(key.clone(), Some(entry.version))
            .delete(key.clone());

        match self.kv.commit(write).await {
            Ok(_) => {
                info!("Player unregistered");
                Ok(())
            }
            Err(error) if error.is_conflict() => {
                if self.kv.get(&key).await?.is_none() {
                    Err(LeaderboardError::NotRegistered(player_id.to_string()))
                } else {
                    Err(error.into())
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_season(&self, season_id: &str) -> Result<Option<Versioned<Season>>, StoreError> {
        let season = self
            .kv
            .get(&Key::season(season_id))
            .await?
            .map(decode)
            .transpose()?;
        debug!(found = season.is_some(), "Fetched season");
        Ok(season)
    }

    #[instrument(skip(self))]
    pub async fn get_latest_pointer(&self) -> Result<Option<Versioned<String>>, StoreError> {
        self.kv
            .get(&Key::latest_season())
            .await?
            .map(decode)
            .transpose()
    }

    #[instrument(skip(self))]
    pub async fn get_latest_season(&self) -> Result<Option<Versioned<Season>>, StoreError> {
        let Some(pointer) = self.get_latest_pointer().await? else {
            debug!("No latest season pointer");
            return Ok(None);
        };

        match self.get_season(&pointer.value).await? {
            Some(season) => Ok(Some(season)),
            None => {
                warn!(season_id = %pointer.value, "Latest season pointer is dangling");
                Err(StoreError::DanglingPointer(pointer.value))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_seasons(&self) -> Result<Vec<Season>, StoreError> {
        self.kv
            .list(Namespace::Seasons)
            .await?
            .into_iter()
            .map(|(_, entry)| decode(entry).map(|season: Versioned<Season>| season.value))
            .collect()
    }

    /// Writes the season body, and optionally the pointer, as one atomic step.
    ///
    /// `expected` is the season version the caller read (`None` when the
    /// season must not exist yet).
    #[instrument(skip(self, season), fields(season_id = %season.id))]
    pub async fn put_season(
        &self,
        season: &Season,
        expected: Option<Version>,
        pointer: PointerUpdate,
    ) -> Result<Version, StoreError> {
        let key = Key::season(&season.id);
        let mut write = AtomicWrite::new()
            .check(key.clone(), expected)
            .set(key, serde_json::to_value(season)?);

        if let PointerUpdate::Advance { expected } = pointer {
            write = write
                .check(Key::latest_season(), expected)
                .set(Key::latest_season(), serde_json::to_value(&season.id)?);
        }

        let version = self.kv.commit(write).await.map_err(|error| {
            warn!(error = %error, "Season write rejected");
            error
        })?;

        info!(
            %version,
            advanced_pointer = matches!(pointer, PointerUpdate::Advance { .. }),
            "Season stored"
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::FakeJudgeClient;
    use crate::store::InMemoryKvStore;
    use chrono::{TimeZone, Utc};

    fn repository() -> (SeasonRepository, Arc<InMemoryKvStore>) {
        let kv = Arc::new(InMemoryKvStore::new());
        (SeasonRepository::new(kv.clone()), kv)
    }

    fn player(id: &str, username: &str) -> Player {
        Player {
            id: id.to_string(),
            judge_username: username.to_string(),
        }
    }

    fn season(day: u32) -> Season {
        Season::empty(Utc.with_ymd_and_hms(2023, 8, day, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn registers_verified_player_once() {
        let (repo, kv) = repository();
        let judge = FakeJudgeClient::new().with_user("alice_lc");

        repo.register_player(player("alice", "alice_lc"), &judge)
            .await
            .unwrap();
        let second = repo.register_player(player("alice", "alice_lc"), &judge).await;

        assert!(matches!(second, Err(LeaderboardError::AlreadyRegistered(_))));
        assert_eq!(kv.count(Namespace::Players), 1);
        assert_eq!(
            repo.get_player("alice").await.unwrap().unwrap().value,
            player("alice", "alice_lc")
        );
    }

    #[tokio::test]
    async fn rejects_unverified_username() {
        let (repo, kv) = repository();
        let judge = FakeJudgeClient::new();

        let result = repo.register_player(player("bob", "ghost"), &judge).await;

        assert!(matches!(result, Err(LeaderboardError::VerificationFailed(name)) if name == "ghost"));
        assert_eq!(kv.count(Namespace::Players), 0);
    }

    #[tokio::test]
    async fn surfaces_judge_outage_during_registration() {
        let (repo, _) = repository();
        let judge = FakeJudgeClient::new().with_user("carol_lc");
        judge.fail_user("carol_lc");

        let result = repo.register_player(player("carol", "carol_lc"), &judge).await;
        assert!(matches!(result, Err(LeaderboardError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn unregister_requires_existing_player() {
        let (repo, _) = repository();
        let judge = FakeJudgeClient::new().with_user("alice_lc");

        let missing = repo.unregister_player("alice").await;
        assert!(matches!(missing, Err(LeaderboardError::NotRegistered(_))));

        repo.register_player(player("alice", "alice_lc"), &judge)
            .await
            .unwrap();
        repo.unregister_player("alice").await.unwrap();
        assert!(repo.get_player("alice").await.unwrap().is_none());
        assert!(repo.list_players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_season_advances_pointer_atomically() {
        let (repo, _) = repository();
        let first = season(20);

        let version = repo
            .put_season(&first, None, PointerUpdate::Advance { expected: None })
            .await
            .unwrap();

        let latest = repo.get_latest_season().await.unwrap().unwrap();
        assert_eq!(latest.value, first);
        assert_eq!(latest.version, version);
        assert_eq!(repo.get_latest_pointer().await.unwrap().unwrap().value, first.id);
    }

    #[tokio::test]
    async fn stale_pointer_expectation_aborts_body_write() {
        let (repo, _) = repository();
        repo.put_season(&season(20), None, PointerUpdate::Advance { expected: None })
            .await
            .unwrap();

        let next = season(27);
        let result = repo
            .put_season(&next, None, PointerUpdate::Advance { expected: None })
            .await;

        assert!(result.unwrap_err().is_conflict());
        assert!(repo.get_season(&next.id).await.unwrap().is_none());
        assert_eq!(
            repo.get_latest_season().await.unwrap().unwrap().value.id,
            season(20).id
        );
    }

    #[tokio::test]
    async fn second_creator_of_same_season_conflicts() {
        let (repo, _) = repository();
        let target = season(27);

        repo.put_season(&target, None, PointerUpdate::Keep).await.unwrap();
        let result = repo.put_season(&target, None, PointerUpdate::Keep).await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn dangling_pointer_is_an_error() {
        let (repo, kv) = repository();
        kv.commit(AtomicWrite::new().set(Key::latest_season(), serde_json::json!("missing")))
            .await
            .unwrap();

        let result = repo.get_latest_season().await;
        assert!(matches!(result, Err(StoreError::DanglingPointer(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn lists_all_seasons() {
        let (repo, _) = repository();
        repo.put_season(&season(20), None, PointerUpdate::Keep).await.unwrap();
        repo.put_season(&season(27), None, PointerUpdate::Keep).await.unwrap();

        let seasons = repo.list_seasons().await.unwrap();
        assert_eq!(seasons.len(), 2);
        assert!(repo.get_latest_season().await.unwrap().is_none());
    }
}
