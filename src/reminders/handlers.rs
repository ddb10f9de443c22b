use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    reminders::{
        dto::{ReminderRequest, ReminderResponse},
        repo::Reminder,
    },
    state::AppState,
};

const MIN_TITLE_LEN: usize = 3;
const MIN_DESCRIPTION_LEN: usize = 10;

pub fn reminder_routes() -> Router<AppState> {
    Router::new()
        .route("/reminders", post(create_reminder))
        .route("/reminders", get(list_reminders))
        .route("/reminders/:id", get(get_reminder))
        .route("/reminders/:id", patch(select_reminder))
        .route("/reminders/:id", put(update_reminder))
        .route("/reminders/:id", delete(remove_reminder))
}

fn validate(payload: &ReminderRequest) -> Result<(), AppError> {
    if payload.title.len() < MIN_TITLE_LEN {
        return Err(AppError::Validation("Title too short".into()));
    }
    if payload.description.len() < MIN_DESCRIPTION_LEN {
        return Err(AppError::Validation("Description too short".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn create_reminder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ReminderRequest>,
) -> Result<(StatusCode, Json<ReminderResponse>), AppError> {
    validate(&payload)?;

    let reminder =
        Reminder::create(&state.db, user_id, &payload.title, &payload.description).await?;

    info!(user_id = %user_id, reminder_id = %reminder.id, "reminder created");
    Ok((StatusCode::CREATED, Json(reminder.into())))
}

#[instrument(skip(state))]
pub async fn list_reminders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ReminderResponse>>, AppError> {
    let reminders = Reminder::list_by_owner(&state.db, user_id).await?;

    // An empty list is a valid result at this layer; rendering it as 404
    // is a boundary policy kept behind config.
    if reminders.is_empty() && state.config.empty_list_as_not_found {
        return Err(AppError::NotFound("reminder"));
    }

    Ok(Json(reminders.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_reminder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ReminderResponse>, AppError> {
    match Reminder::find_by_owner(&state.db, user_id, id).await? {
        Some(reminder) => Ok(Json(reminder.into())),
        None => {
            warn!(user_id = %user_id, reminder_id = %id, "reminder not found");
            Err(AppError::NotFound("reminder"))
        }
    }
}

/// Marks the reminder as the user's single active one. A `NotFound`
/// outcome means the selection failed and any previous active state has
/// been cleared.
#[instrument(skip(state))]
pub async fn select_reminder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ReminderResponse>, AppError> {
    match Reminder::select(&state.db, user_id, id).await? {
        Some(reminder) => {
            info!(user_id = %user_id, reminder_id = %id, "reminder selected");
            Ok(Json(reminder.into()))
        }
        None => {
            warn!(user_id = %user_id, reminder_id = %id, "select target not found");
            Err(AppError::NotFound("reminder"))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn update_reminder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ReminderRequest>,
) -> Result<StatusCode, AppError> {
    validate(&payload)?;

    let rows =
        Reminder::update(&state.db, user_id, id, &payload.title, &payload.description).await?;
    debug!(user_id = %user_id, reminder_id = %id, rows, "reminder update");

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn remove_reminder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let rows = Reminder::delete(&state.db, user_id, id).await?;
    debug!(user_id = %user_id, reminder_id = %id, rows, "reminder delete");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(title: &str, description: &str) -> ReminderRequest {
        ReminderRequest {
            title: title.into(),
            description: description.into(),
        }
    }

    #[test]
    fn validate_accepts_minimum_lengths() {
        assert!(validate(&req("t1x", "desc-long-1")).is_ok());
    }

    #[test]
    fn validate_rejects_short_title() {
        let err = validate(&req("t", "desc-long-1")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn validate_rejects_short_description() {
        let err = validate(&req("t1x", "short")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
