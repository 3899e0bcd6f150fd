use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::info;

use super::models::Season;
use super::types::{RegisterRequest, RegisterResult, SyncQuery, SyncResult, UnregisterResult};
use crate::shared::{AppError, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/seasons", get(list_seasons))
        .route("/seasons/latest", get(get_latest_season))
        .route("/seasons/:season_id", get(get_season))
        .route("/sync", post(sync))
        .route("/players", post(register))
        .route("/players/:player_id", delete(unregister))
        .with_state(state)
}

pub async fn list_seasons(State(state): State<AppState>) -> Result<Json<Vec<Season>>, AppError> {
    let mut seasons = state.leaderboard.list_seasons().await?;
    seasons.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(Json(seasons))
}

pub async fn get_latest_season(State(state): State<AppState>) -> Result<Json<Season>, AppError> {
    state
        .leaderboard
        .get_latest_season()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No season has been synced yet".to_string()))
}

pub async fn get_season(
    State(state): State<AppState>,
    Path(season_id): Path<String>,
) -> Result<Json<Season>, AppError> {
    state
        .leaderboard
        .get_season(&season_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Season {} not found", season_id)))
}

pub async fn sync(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<SyncResult>, AppError> {
    info!(season_id = ?query.season_id, "Sync requested");
    let result = state
        .leaderboard
        .sync(query.season_id.as_deref(), None)
        .await?;
    Ok(Json(result))
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResult>, AppError> {
    let result = state
        .leaderboard
        .register(&request.player_id, &request.judge_username)
        .await?;
    Ok(Json(result))
}

pub async fn unregister(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<UnregisterResult>, AppError> {
    Ok(Json(state.leaderboard.unregister(&player_id).await?))
}
