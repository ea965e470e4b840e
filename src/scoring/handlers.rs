use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

use super::parser::ScoreResult;
use super::pipeline::{PipelineState, ScoringPipeline, ScoringRun};
use crate::{
    auth::extract::AuthUser,
    ocr::ImageBuffer,
    receipts::{repo_types::Receipt, services::summarize},
    state::AppState,
};

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/receipts/scan", post(scan_multipart)) // multipart field "image"
        .route("/receipts/scan/base64", post(scan_base64))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[derive(Debug, Deserialize)]
pub struct ScanBase64Request {
    /// Bare base64 or a `data:image/...;base64,` URL.
    pub image: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub result: ScoreResult,
    pub receipt: Receipt,
    pub average_score: Option<f64>,
    pub states: Vec<PipelineState>,
}

/// POST /receipts/scan (multipart)
#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn scan_multipart(
    State(state): State<AppState>,
    user: AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<ScanResponse>), (StatusCode, String)> {
    let mut image = None;
    while let Some(field) = mp.next_field().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        (StatusCode::BAD_REQUEST, e.body_text())
    })? {
        let name = field.name().map(|s| s.to_string());
        if matches!(name.as_deref(), Some("image") | Some("file")) {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            image = Some(
                ImageBuffer::new(data, content_type)
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
            );
            break;
        }
    }
    let image = image.ok_or((StatusCode::BAD_REQUEST, "image is required".to_string()))?;

    score_for_user(&state, &user, image).await
}

/// POST /receipts/scan/base64 { image, content_type? }
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn scan_base64(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ScanBase64Request>,
) -> Result<(StatusCode, Json<ScanResponse>), (StatusCode, String)> {
    let image = ImageBuffer::from_base64(&body.image, body.content_type.as_deref())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    score_for_user(&state, &user, image).await
}

async fn score_for_user(
    state: &AppState,
    user: &AuthUser,
    image: ImageBuffer,
) -> Result<(StatusCode, Json<ScanResponse>), (StatusCode, String)> {
    let pipeline = ScoringPipeline::from_state(state);
    let mut run = ScoringRun::new();
    let scored = match pipeline.run(&mut run, &user.email, image).await {
        Ok(scored) => scored,
        Err(e) => {
            if e.status().is_server_error() {
                error!(error = %e, states = ?run.history(), "scoring run failed");
            } else {
                warn!(error = %e, states = ?run.history(), "scoring run failed");
            }
            return Err((e.status(), e.user_message().to_string()));
        }
    };

    // the receipt is already saved; a failed re-read only loses the average
    let average_score = match state.receipts.list_for_email(&user.email).await {
        Ok(receipts) => summarize(receipts).average_score,
        Err(e) => {
            warn!(error = %e, "average recompute failed");
            None
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ScanResponse {
            result: scored.result,
            receipt: scored.receipt,
            average_score,
            states: run.history().to_vec(),
        }),
    ))
}
