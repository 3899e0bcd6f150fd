use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::leaderboard::{LeaderboardError, LeaderboardService};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub leaderboard: Arc<LeaderboardService>,
}

impl AppState {
    pub fn new(leaderboard: Arc<LeaderboardService>) -> Self {
        Self { leaderboard }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Leaderboard(error) => match error {
                LeaderboardError::AlreadyRegistered(_)
                | LeaderboardError::NotRegistered(_)
                | LeaderboardError::Conflict(_) => StatusCode::CONFLICT,
                LeaderboardError::VerificationFailed(_) => StatusCode::BAD_REQUEST,
                LeaderboardError::SeasonNotFound(_) => StatusCode::NOT_FOUND,
                LeaderboardError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
                LeaderboardError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::Leaderboard(LeaderboardError::Storage(_)) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
