use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::AppError;

/// Reminder record in the database. Every query is filtered by
/// `(id, user_id)` jointly, never by `id` alone.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub active: bool,
    pub created_at: OffsetDateTime,
}

impl Reminder {
    /// Insert a new reminder; reminders are never created selected.
    pub async fn create(
        db: &PgPool,
        user_id: i64,
        title: &str,
        description: &str,
    ) -> Result<Reminder, AppError> {
        let reminder = sqlx::query_as::<_, Reminder>(
            r#"
            INSERT INTO reminders (user_id, title, description, active)
            VALUES ($1, $2, $3, FALSE)
            RETURNING id, user_id, title, description, active, created_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(description)
        .fetch_one(db)
        .await?;
        Ok(reminder)
    }

    pub async fn list_by_owner(db: &PgPool, user_id: i64) -> Result<Vec<Reminder>, AppError> {
        let rows = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT id, user_id, title, description, active, created_at
            FROM reminders
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// A missing id and another user's id are indistinguishable here:
    /// both come back as `None`.
    pub async fn find_by_owner(
        db: &PgPool,
        user_id: i64,
        id: i64,
    ) -> Result<Option<Reminder>, AppError> {
        let reminder = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT id, user_id, title, description, active, created_at
            FROM reminders
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(reminder)
    }

    /// Overwrite title and description. Zero rows affected (unknown or
    /// foreign id) is reported, not treated as an error.
    pub async fn update(
        db: &PgPool,
        user_id: i64,
        id: i64,
        title: &str,
        description: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET title = $3, description = $4
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .bind(description)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(db: &PgPool, user_id: i64, id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM reminders
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Make the given reminder the user's single active one.
    ///
    /// Clearing the previous selection and setting the new one happen in
    /// one transaction, serialized per owner by an advisory lock: under
    /// READ COMMITTED alone, a second select starting before the first
    /// commits would not see the freshly activated row in its clear step
    /// and both could commit active rows. The partial unique index on
    /// `(user_id) WHERE active` backstops the invariant at the schema
    /// level. When the id does not belong to the user the second update
    /// touches nothing and `None` is returned; the clearing still
    /// commits, so the previous selection stays off.
    pub async fn select(
        db: &PgPool,
        user_id: i64,
        id: i64,
    ) -> Result<Option<Reminder>, AppError> {
        let mut tx = db.begin().await?;

        sqlx::query(r#"SELECT pg_advisory_xact_lock($1)"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE reminders
            SET active = FALSE
            WHERE user_id = $1 AND active = TRUE
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE reminders
            SET active = TRUE
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let reminder = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT id, user_id, title, description, active, created_at
            FROM reminders
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(reminder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    async fn make_user(db: &PgPool, email: &str) -> i64 {
        sqlx::query_scalar(
            r#"INSERT INTO users (email, password_hash) VALUES ($1, 'hash') RETURNING id"#,
        )
        .bind(email)
        .fetch_one(db)
        .await
        .expect("insert user")
    }

    async fn count_active(db: &PgPool, user_id: i64) -> i64 {
        sqlx::query_scalar(r#"SELECT count(*) FROM reminders WHERE user_id = $1 AND active"#)
            .bind(user_id)
            .fetch_one(db)
            .await
            .expect("count active")
    }

    #[sqlx::test]
    async fn select_switches_the_single_active_reminder(db: PgPool) {
        let user = make_user(&db, "a@x.com").await;
        let first = Reminder::create(&db, user, "t1", "desc-long-1").await.unwrap();
        let second = Reminder::create(&db, user, "t2", "desc-long-2").await.unwrap();
        assert!(!first.active);
        assert!(!second.active);

        let selected = Reminder::select(&db, user, first.id).await.unwrap().unwrap();
        assert!(selected.active);
        assert_eq!(count_active(&db, user).await, 1);

        let selected = Reminder::select(&db, user, second.id).await.unwrap().unwrap();
        assert!(selected.active);
        let first = Reminder::find_by_owner(&db, user, first.id).await.unwrap().unwrap();
        assert!(!first.active);
        assert_eq!(count_active(&db, user).await, 1);
    }

    #[sqlx::test]
    async fn concurrent_selects_leave_one_active_row(
        pool_opts: PgPoolOptions,
        connect_opts: PgConnectOptions,
    ) {
        let db = pool_opts
            .max_connections(4)
            .connect_with(connect_opts)
            .await
            .expect("connect");

        let user = make_user(&db, "a@x.com").await;
        let first = Reminder::create(&db, user, "t1", "desc-long-1").await.unwrap();
        let second = Reminder::create(&db, user, "t2", "desc-long-2").await.unwrap();

        let (a, b) = tokio::join!(
            Reminder::select(&db, user, first.id),
            Reminder::select(&db, user, second.id),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(count_active(&db, user).await, 1);
    }

    #[sqlx::test]
    async fn select_of_foreign_reminder_clears_previous_and_reports_missing(db: PgPool) {
        let owner = make_user(&db, "a@x.com").await;
        let other = make_user(&db, "b@x.com").await;
        let own = Reminder::create(&db, owner, "t1", "desc-long-1").await.unwrap();
        let foreign = Reminder::create(&db, other, "t2", "desc-long-2").await.unwrap();

        Reminder::select(&db, owner, own.id).await.unwrap().unwrap();

        let result = Reminder::select(&db, owner, foreign.id).await.unwrap();
        assert!(result.is_none());
        // Selection failed, and the previously active reminder was cleared.
        assert_eq!(count_active(&db, owner).await, 0);
        let foreign = Reminder::find_by_owner(&db, other, foreign.id).await.unwrap().unwrap();
        assert!(!foreign.active);
    }

    #[sqlx::test]
    async fn find_never_returns_a_foreign_reminder(db: PgPool) {
        let owner = make_user(&db, "a@x.com").await;
        let other = make_user(&db, "b@x.com").await;
        let foreign = Reminder::create(&db, other, "t2", "desc-long-2").await.unwrap();

        let found = Reminder::find_by_owner(&db, owner, foreign.id).await.unwrap();
        assert!(found.is_none());
    }

    #[sqlx::test]
    async fn update_of_foreign_reminder_affects_nothing(db: PgPool) {
        let owner = make_user(&db, "a@x.com").await;
        let other = make_user(&db, "b@x.com").await;
        let foreign = Reminder::create(&db, other, "t2", "desc-long-2").await.unwrap();

        let rows = Reminder::update(&db, owner, foreign.id, "new", "desc-long-3")
            .await
            .unwrap();
        assert_eq!(rows, 0);

        let untouched = Reminder::find_by_owner(&db, other, foreign.id).await.unwrap().unwrap();
        assert_eq!(untouched.title, "t2");
        assert_eq!(untouched.description, "desc-long-2");
    }

    #[sqlx::test]
    async fn delete_of_missing_reminder_is_a_noop(db: PgPool) {
        let owner = make_user(&db, "a@x.com").await;

        let rows = Reminder::delete(&db, owner, 12345).await.unwrap();
        assert_eq!(rows, 0);
    }
}
