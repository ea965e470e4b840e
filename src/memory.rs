//! In-process account and receipt store backing `AppState::fake()`.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{AccountError, AccountStore};
use crate::auth::repo_types::User;
use crate::receipts::repo::{ReceiptStore, StoreError};
use crate::receipts::repo_types::{LeaderboardRow, Receipt};

struct Account {
    user: User,
    receipts: Vec<Receipt>,
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Seeds an account that cannot log in (empty password hash).
    pub fn add_user(&self, name: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(
            email.to_string(),
            Account {
                user: User {
                    id,
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: String::new(),
                },
                receipts: Vec::new(),
            },
        );
        id
    }

    /// Seeds history directly; unknown emails are ignored.
    pub fn append_scores(&self, email: &str, scores: &[f64]) {
        if let Some(account) = self.lock().get_mut(email) {
            for &score in scores {
                let receipt = new_receipt(account.user.id, score);
                account.receipts.push(receipt);
            }
        }
    }

    pub fn receipt_count(&self) -> usize {
        self.lock().values().map(|a| a.receipts.len()).sum()
    }

    pub fn account_count(&self) -> usize {
        self.lock().len()
    }
}

fn new_receipt(user_id: Uuid, score: f64) -> Receipt {
    Receipt {
        id: Uuid::new_v4(),
        user_id,
        score,
        date: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        Ok(self.lock().get(email).map(|a| a.user.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        Ok(self
            .lock()
            .values()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone()))
    }

    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AccountError> {
        let mut accounts = self.lock();
        if accounts.contains_key(email) {
            return Err(AccountError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                receipts: Vec::new(),
            },
        );
        Ok(user)
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn append(&self, email: &str, score: f64) -> Result<Receipt, StoreError> {
        let mut accounts = self.lock();
        let account = accounts.get_mut(email).ok_or(StoreError::UserNotFound)?;
        let receipt = new_receipt(account.user.id, score);
        account.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn list_for_email(&self, email: &str) -> Result<Vec<Receipt>, StoreError> {
        let accounts = self.lock();
        let account = accounts.get(email).ok_or(StoreError::UserNotFound)?;
        Ok(account.receipts.iter().rev().cloned().collect())
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardRow>, StoreError> {
        let mut rows: Vec<LeaderboardRow> = self
            .lock()
            .values()
            .filter(|a| !a.receipts.is_empty())
            .map(|a| LeaderboardRow {
                name: a.user.name.clone(),
                receipts: a.receipts.len() as i64,
                average_score: a.receipts.iter().map(|r| r.score).sum::<f64>()
                    / a.receipts.len() as f64,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.average_score
                .total_cmp(&a.average_score)
                .then(b.receipts.cmp(&a.receipts))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_to_unknown_email_fails_without_mutation() {
        let store = MemoryStore::new();
        store.add_user("Ada", "ada@example.com");
        store.append_scores("ada@example.com", &[50.0]);

        let err = store.append("nobody@example.com", 80.0).await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound));
        assert_eq!(err.to_string(), "user not found");
        assert_eq!(store.receipt_count(), 1);
    }

    #[tokio::test]
    async fn append_assigns_date_and_lists_newest_first() {
        let store = MemoryStore::new();
        let id = store.add_user("Ada", "ada@example.com");
        let before = OffsetDateTime::now_utc();

        let first = store.append("ada@example.com", 40.0).await.unwrap();
        let second = store.append("ada@example.com", 60.0).await.unwrap();
        assert_eq!(first.user_id, id);
        assert!(first.date >= before);

        let listed = store.list_for_email("ada@example.com").await.unwrap();
        assert_eq!(listed, vec![second, first]);
    }

    #[tokio::test]
    async fn duplicate_email_is_taken_and_not_overwritten() {
        let store = MemoryStore::new();
        let first = store.create("Ada", "ada@example.com", "h1").await.unwrap();

        let err = store.create("Imposter", "ada@example.com", "h2").await.unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken));

        let kept = store.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(kept.name, "Ada");
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_average_and_skips_empty_histories() {
        let store = MemoryStore::new();
        store.add_user("Ada", "ada@example.com");
        store.add_user("Bob", "bob@example.com");
        store.add_user("Cy", "cy@example.com");
        store.append_scores("ada@example.com", &[50.0, 70.0]);
        store.append_scores("bob@example.com", &[90.0]);

        let rows = store.leaderboard(10).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Ada"]);
        assert_eq!(rows[1].average_score, 60.0);

        assert_eq!(store.leaderboard(1).await.unwrap().len(), 1);
    }
}
