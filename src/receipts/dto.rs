use serde::{Deserialize, Serialize};

use super::repo_types::{LeaderboardRow, Receipt};

#[derive(Debug, Deserialize)]
pub struct AppendReceiptRequest {
    pub email: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct ReceiptSummary {
    pub receipts: Vec<Receipt>,
    pub count: usize,
    pub average_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 { 10 }

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub receipts: i64,
    pub average_score: f64,
}

impl LeaderboardEntry {
    pub fn ranked(rows: Vec<LeaderboardRow>) -> Vec<Self> {
        rows.into_iter()
            .enumerate()
            .map(|(i, r)| Self {
                rank: i + 1,
                name: r.name,
                receipts: r.receipts,
                average_score: super::services::round_for_display(r.average_score),
            })
            .collect()
    }
}
