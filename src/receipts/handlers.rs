use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{auth::{extract::AuthUser, services::normalize_email}, state::AppState};

use super::dto::{AppendReceiptRequest, LeaderboardEntry, LeaderboardQuery, ReceiptSummary};
use super::repo::StoreError;
use super::repo_types::Receipt;
use super::services::{is_valid_score, summarize};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/receipts", get(list_receipts))
        .route("/leaderboard", get(leaderboard))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/receipts", post(append_receipt))
}

/// POST /receipts { email, score }
#[instrument(skip(state, body))]
pub async fn append_receipt(
    State(state): State<AppState>,
    Json(body): Json<AppendReceiptRequest>,
) -> Result<(StatusCode, Json<Receipt>), (StatusCode, String)> {
    if !is_valid_score(body.score) {
        warn!(score = body.score, "score out of range");
        return Err((
            StatusCode::BAD_REQUEST,
            "Score must be between 0 and 100".into(),
        ));
    }

    let email = normalize_email(&body.email);
    match state.receipts.append(&email, body.score).await {
        Ok(receipt) => {
            info!(user_id = %receipt.user_id, score = receipt.score, "receipt appended");
            Ok((StatusCode::CREATED, Json(receipt)))
        }
        Err(StoreError::UserNotFound) => {
            warn!(%email, "append for unknown user");
            Err((StatusCode::BAD_REQUEST, "User not found".into()))
        }
        Err(e) => {
            error!(error = %e, %email, "append receipt failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Server error".into()))
        }
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_receipts(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ReceiptSummary>, (StatusCode, String)> {
    let receipts = state
        .receipts
        .list_for_email(&user.email)
        .await
        .map_err(|e| store_rejection(e, "list receipts failed"))?;
    Ok(Json(summarize(receipts)))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, (StatusCode, String)> {
    let limit = q.limit.clamp(1, 100);
    let rows = state
        .receipts
        .leaderboard(limit)
        .await
        .map_err(|e| store_rejection(e, "leaderboard failed"))?;
    Ok(Json(LeaderboardEntry::ranked(rows)))
}

fn store_rejection(e: StoreError, what: &str) -> (StatusCode, String) {
    match e {
        StoreError::UserNotFound => (StatusCode::UNAUTHORIZED, "User not found".into()),
        other => {
            error!(error = %other, "{}", what);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(store: Arc<MemoryStore>) -> (Router, AppState) {
        let state = AppState::fake().with_store(store);
        let router = Router::new()
            .merge(read_routes())
            .merge(write_routes())
            .with_state(state.clone());
        (router, state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn append_returns_created_with_server_date() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("Ada", "ada@example.com");
        let (router, _) = app(store.clone());

        let response = router
            .oneshot(post_json(
                "/receipts",
                serde_json::json!({"email": " Ada@Example.com", "score": 80}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["score"], 80.0);
        assert!(json["date"].is_string());
        assert_eq!(store.receipt_count(), 1);
    }

    #[tokio::test]
    async fn append_for_unknown_email_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("Ada", "ada@example.com");
        let (router, _) = app(store.clone());

        let response = router
            .oneshot(post_json(
                "/receipts",
                serde_json::json!({"email": "ghost@example.com", "score": 80}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"User not found");
        assert_eq!(store.receipt_count(), 0);
    }

    #[tokio::test]
    async fn append_rejects_out_of_range_score() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("Ada", "ada@example.com");
        let (router, _) = app(store.clone());

        let response = router
            .oneshot(post_json(
                "/receipts",
                serde_json::json!({"email": "ada@example.com", "score": 140}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.receipt_count(), 0);
    }

    #[tokio::test]
    async fn list_returns_summary_for_token_owner() {
        let store = Arc::new(MemoryStore::new());
        let ada = store.add_user("Ada", "ada@example.com");
        store.add_user("Bob", "bob@example.com");
        store.append_scores("ada@example.com", &[50.0, 90.0]);
        store.append_scores("bob@example.com", &[10.0]);
        let (router, state) = app(store);
        let bearer = state.bearer_for(ada);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/receipts")
                    .header("Authorization", bearer)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 2);
        assert_eq!(json["average_score"], 70.0);
        assert_eq!(json["receipts"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn leaderboard_ranks_users() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("Ada", "ada@example.com");
        store.add_user("Bob", "bob@example.com");
        store.append_scores("ada@example.com", &[50.0]);
        store.append_scores("bob@example.com", &[75.0, 80.0]);
        let (router, _) = app(store);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/leaderboard?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["rank"], 1);
        assert_eq!(json[0]["name"], "Bob");
        assert_eq!(json[0]["average_score"], 77.5);
        assert_eq!(json[1]["name"], "Ada");
    }
}
