use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{LeaderboardError, LeaderboardService, SyncResult};

/// One unattended sync of the current week. A conflicting write means
/// another trigger got there first, so the pass is retried once against
/// the fresh state.
pub async fn sync_current_season(
    service: &LeaderboardService,
) -> Result<SyncResult, LeaderboardError> {
    match service.sync(None, None).await {
        Err(error) if error.is_retryable() => {
            warn!(error = %error, "Scheduled sync conflicted, retrying once");
            service.sync(None, None).await
        }
        other => other,
    }
}

/// Spawns the periodic sync trigger. The first pass runs immediately.
pub fn spawn_periodic_sync(service: Arc<LeaderboardService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;

            match sync_current_season(&service).await {
                Ok(result) => info!(
                    season_id = %result.season.id,
                    players = result.season.players.len(),
                    "Scheduled sync finished"
                ),
                Err(error) => error!(error = %error, "Scheduled sync failed"),
            }
        }
    })
}
