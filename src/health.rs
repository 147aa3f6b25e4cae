use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, instrument};

use crate::{db::DbStats, error::AppError, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub database: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub db_time: Option<OffsetDateTime>,
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/db", get(db_stats))
}

#[instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> Response {
    let timestamp = OffsetDateTime::now_utc();
    match state.probe.db_time().await {
        Ok(db_time) => Json(HealthResponse {
            status: "OK".into(),
            timestamp,
            database: "Connected".into(),
            db_time: Some(db_time),
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "ERROR".into(),
                    timestamp,
                    database: "Disconnected".into(),
                    db_time: None,
                }),
            )
                .into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn db_stats(State(state): State<AppState>) -> Result<Json<DbStats>, AppError> {
    Ok(Json(state.probe.stats().await?))
}
