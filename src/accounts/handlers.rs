use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    accounts::{
        dto::{
            ListQuery, LoginRequest, RegisterRequest, RemoveResponse, SetAvatarRequest,
            UpdateProfileRequest,
        },
        extractors::AuthUser,
        model::AccountView,
        paging::Page,
        service::{NewAccount, ProfileChanges},
    },
    error::AppError,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/register", post(register))
        .route("/accounts/login", post(login))
        .route("/accounts", get(list))
        .route("/accounts/profile", get(profile))
        .route("/accounts/:id", put(update_profile).delete(remove))
        .route("/accounts/:id/avatar", put(set_avatar))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AccountView>, AppError> {
    let email = payload.email.trim();
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::validation("password too short"));
    }

    let view = state
        .accounts
        .register(NewAccount {
            email: payload.email,
            password: payload.password,
            name: payload.name,
        })
        .await?;
    Ok(Json(view))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AccountView>, AppError> {
    if !is_valid_email(payload.email.trim()) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }
    let view = state.accounts.login(&payload.email, &payload.password).await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<AccountView>>, AppError> {
    let page = state
        .accounts
        .list(&query.keyword, query.page, query.page_size)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
async fn profile(
    State(state): State<AppState>,
    AuthUser(account_id): AuthUser,
) -> Result<Json<AccountView>, AppError> {
    let view = state.accounts.profile(account_id).await?;
    Ok(Json(view))
}

#[instrument(skip(state, payload))]
async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<AccountView>, AppError> {
    let view = state
        .accounts
        .update_profile(
            id,
            ProfileChanges {
                name: payload.name,
                avatar_url: payload.avatar_url,
                avatar_ref: payload.avatar_ref,
            },
        )
        .await?;
    Ok(Json(view))
}

#[instrument(skip(state, payload))]
async fn set_avatar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAvatarRequest>,
) -> Result<Json<Option<AccountView>>, AppError> {
    let view = state
        .accounts
        .set_avatar(id, payload.avatar_url, payload.avatar_ref)
        .await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RemoveResponse>, AppError> {
    let deleted = state.accounts.remove(id).await?;
    Ok(Json(RemoveResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_malformed_input() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }
}
