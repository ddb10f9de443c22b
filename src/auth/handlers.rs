use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{delete, patch, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CredentialsRequest, RegisteredUser, TokenResponse, UpdateUserRequest},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::User,
    },
    error::AppError,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

const MIN_PASSWORD_LEN: usize = 6;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/login", post(login))
        .route("/users/:id", patch(update_user))
        .route("/users/:id", delete(remove_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation("Password too short".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    // Unknown email and wrong password are deliberately the same error,
    // so responses do not reveal which emails are registered.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<StatusCode, AppError> {
    if id != user_id {
        warn!(user_id = %user_id, path_id = %id, "account update for another user rejected");
        return Err(AppError::Forbidden("Cannot modify another account"));
    }

    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Invalid email".into()));
    }
    if let Some(password) = &payload.password {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation("Password too short".into()));
        }
    }

    let new_hash = match &payload.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    User::update_credentials(&state.db, user_id, &payload.email, new_hash.as_deref()).await?;

    info!(user_id = %user_id, "user updated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn remove_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if id != user_id {
        warn!(user_id = %user_id, path_id = %id, "account removal for another user rejected");
        return Err(AppError::Forbidden("Cannot remove another account"));
    }

    User::delete(&state.db, user_id).await?;

    info!(user_id = %user_id, "user removed");
    Ok(StatusCode::NO_CONTENT)
}
