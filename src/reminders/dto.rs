use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Request body for creating or overwriting a reminder.
#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    pub title: String,
    pub description: String,
}

/// Reminder as returned to its owner.
#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<crate::reminders::repo::Reminder> for ReminderResponse {
    fn from(r: crate::reminders::repo::Reminder) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            active: r.active,
            created_at: r.created_at,
        }
    }
}
