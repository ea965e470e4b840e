use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::User;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("email already registered")]
    EmailTaken,
    #[error("database error: {0}")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for AccountError {
    fn from(e: sqlx::Error) -> Self {
        let unique = e
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == UNIQUE_VIOLATION);
        if unique {
            AccountError::EmailTaken
        } else {
            AccountError::Db(e)
        }
    }
}

/// Registered accounts, keyed by normalized email.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError>;
    /// The unique email index is the only duplicate check, so two racing
    /// signups for one email leave exactly one account and one `EmailTaken`.
    async fn create(&self, name: &str, email: &str, password_hash: &str)
        -> Result<User, AccountError>;
}

pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password_hash FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password_hash FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AccountError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}
