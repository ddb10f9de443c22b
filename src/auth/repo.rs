use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::AppError;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. A duplicate email surfaces
    /// as `DuplicateCredential` via the unique constraint.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Overwrite email, and the password hash when a new one is given,
    /// for an existing user.
    pub async fn update_credentials(
        db: &PgPool,
        id: i64,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete a user; owned reminders cascade at the schema level.
    pub async fn delete(db: &PgPool, id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
