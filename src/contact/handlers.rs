use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{extractors::authenticate, jwt::JwtKeys},
    contact::{
        dto::{ContactCreated, ContactRequest},
        repo_types::ContactMessage,
        services,
    },
    error::{AppError, AppJson},
    rate_limit::{Bucket, ClientKey},
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/contact", get(list_contacts).post(submit_contact))
}

#[instrument(skip(state, payload, key), fields(client = %key.0))]
pub async fn submit_contact(
    State(state): State<AppState>,
    key: ClientKey,
    AppJson(payload): AppJson<ContactRequest>,
) -> Result<(StatusCode, Json<ContactCreated>), AppError> {
    state.limiter.check(Bucket::Contact, &key.0)?;
    let created = services::submit(state.contacts.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip_all)]
pub async fn list_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ContactMessage>>, AppError> {
    if state.config.contact_list_requires_auth {
        authenticate(&headers, &JwtKeys::from_ref(&state))?;
    }
    let rows = services::list(state.contacts.as_ref()).await?;
    Ok(Json(rows))
}
