use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MessageResponse, SignupRequest, VerifyResponse},
        extractors::{AuthUser, BearerToken},
        jwt::JwtKeys,
        services,
    },
    error::{AppError, AppJson},
    rate_limit::{Bucket, ClientKey},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/verify", get(verify))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload, key), fields(client = %key.0))]
pub async fn signup(
    State(state): State<AppState>,
    key: ClientKey,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    state.limiter.check(Bucket::Auth, &key.0)?;
    let keys = JwtKeys::from_ref(&state);
    let res = services::signup(state.users.as_ref(), &keys, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload, key), fields(client = %key.0))]
pub async fn login(
    State(state): State<AppState>,
    key: ClientKey,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    state.limiter.check(Bucket::Auth, &key.0)?;
    let keys = JwtKeys::from_ref(&state);
    let res = services::login(state.users.as_ref(), &keys, payload).await?;
    Ok(Json(res))
}

#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<VerifyResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let user = services::verify(state.users.as_ref(), &keys, &token).await?;
    Ok(Json(VerifyResponse { user }))
}

/// Tokens are stateless; this only acknowledges the client's logout.
#[instrument(skip_all)]
pub async fn logout(user: AuthUser) -> Json<MessageResponse> {
    info!(user_id = user.id, email = %user.email, "user logged out");
    Json(MessageResponse {
        message: "Logout successful".into(),
    })
}
