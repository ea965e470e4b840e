use sqlx::FromRow;
use uuid::Uuid;

/// A row of `users`. Only ever leaves the process as a `PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
