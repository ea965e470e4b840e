use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One scored receipt. Never updated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub score: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime, // assigned by the store at append time
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LeaderboardRow {
    pub name: String,
    pub receipts: i64,
    pub average_score: f64,
}
