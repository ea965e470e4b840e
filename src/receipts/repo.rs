use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{LeaderboardRow, Receipt};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    UserNotFound,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Receipt history keyed by user email.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Appends `{score, date: now}` to the user's history in one step.
    /// Fails with `UserNotFound` without writing anything when the email is unknown.
    async fn append(&self, email: &str, score: f64) -> Result<Receipt, StoreError>;
    /// Newest first.
    async fn list_for_email(&self, email: &str) -> Result<Vec<Receipt>, StoreError>;
    /// Users with at least one receipt, best average first.
    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardRow>, StoreError>;
}

#[derive(Clone)]
pub struct PgReceiptStore {
    db: PgPool,
}

impl PgReceiptStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReceiptStore for PgReceiptStore {
    async fn append(&self, email: &str, score: f64) -> Result<Receipt, StoreError> {
        let row = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (user_id, score)
            SELECT id, $2
              FROM users
             WHERE email = $1
            RETURNING id, user_id, score, date
            "#,
        )
        .bind(email)
        .bind(score)
        .fetch_optional(&self.db)
        .await?;

        row.ok_or(StoreError::UserNotFound)
    }

    async fn list_for_email(&self, email: &str) -> Result<Vec<Receipt>, StoreError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(r#"SELECT id FROM users WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        let user_id = user_id.ok_or(StoreError::UserNotFound)?;

        let rows = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, user_id, score, date
              FROM receipts
             WHERE user_id = $1
             ORDER BY date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardRow>, StoreError> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT u.name,
                   COUNT(r.id)  AS receipts,
                   AVG(r.score) AS average_score
              FROM users u
              JOIN receipts r ON r.user_id = u.id
             GROUP BY u.id, u.name
             ORDER BY average_score DESC, receipts DESC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
