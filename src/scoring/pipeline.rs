//! One receipt-scoring run: image -> text -> score -> persisted receipt.

use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use super::client::{build_prompt, CompletionClient, LlmError};
use super::parser::{parse_score_reply, ParseError, ScoreResult};
use super::retry::{complete_with_backoff, Backoff, RetryPolicy};
use crate::ocr::{await_text, ImageBuffer, TextExtractor};
use crate::receipts::repo::{ReceiptStore, StoreError};
use crate::receipts::repo_types::Receipt;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    ImageSelected,
    Extracting,
    Scoring,
    RetryWaiting,
    Scored,
    Saving,
    Saved,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, ImageSelected)
                | (ImageSelected, Extracting)
                | (Extracting, Scoring)
                | (Extracting, Failed)
                | (Scoring, RetryWaiting)
                | (RetryWaiting, Scoring)
                | (Scoring, Scored)
                | (Scoring, Failed)
                | (Scored, Saving)
                | (Saving, Saved)
                | (Saving, Failed)
        )
    }
}

/// Tracks the states a run has visited, in order.
#[derive(Debug, Clone)]
pub struct ScoringRun {
    history: Vec<PipelineState>,
}

impl Default for ScoringRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringRun {
    pub fn new() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.history.last().unwrap_or(&PipelineState::Idle)
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn retries(&self) -> usize {
        self.history
            .iter()
            .filter(|s| **s == PipelineState::RetryWaiting)
            .count()
    }

    fn advance(&mut self, next: PipelineState) {
        let current = self.state();
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            current,
            next
        );
        if !current.can_transition_to(next) {
            error!(?current, ?next, "illegal pipeline transition");
        }
        debug!(from = ?current, to = ?next, "pipeline transition");
        self.history.push(next);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("text extraction failed: {0}")]
    Extraction(String),
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("completion request failed: {0}")]
    Llm(LlmError),
    #[error("malformed completion: {0}")]
    Malformed(#[from] ParseError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl ScoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            ScoreError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScoreError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ScoreError::Llm(_) | ScoreError::Malformed(_) => StatusCode::BAD_GATEWAY,
            ScoreError::Persistence(StoreError::UserNotFound) => StatusCode::BAD_REQUEST,
            ScoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the user; never leaks upstream details.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScoreError::Extraction(_) => "error extracting receipt text",
            ScoreError::RateLimited { .. } | ScoreError::Llm(_) | ScoreError::Malformed(_) => {
                "error fetching carbon footprint"
            }
            ScoreError::Persistence(StoreError::UserNotFound) => "User not found",
            ScoreError::Persistence(_) => "error saving receipt",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredReceipt {
    pub result: ScoreResult,
    pub receipt: Receipt,
}

pub struct ScoringPipeline {
    extractor: Arc<dyn TextExtractor>,
    completions: Arc<dyn CompletionClient>,
    store: Arc<dyn ReceiptStore>,
    policy: RetryPolicy,
}

impl ScoringPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        completions: Arc<dyn CompletionClient>,
        store: Arc<dyn ReceiptStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            extractor,
            completions,
            store,
            policy,
        }
    }

    pub fn from_state(st: &AppState) -> Self {
        Self::new(
            st.ocr.clone(),
            st.completions.clone(),
            st.receipts.clone(),
            RetryPolicy::from_config(&st.config.llm),
        )
    }

    /// Runs every stage once, in order. On error `run` ends in `Failed` and
    /// nothing has been persisted.
    #[instrument(skip(self, run, image), fields(content_type = %image.content_type))]
    pub async fn run(
        &self,
        run: &mut ScoringRun,
        email: &str,
        image: ImageBuffer,
    ) -> Result<ScoredReceipt, ScoreError> {
        run.advance(PipelineState::ImageSelected);

        run.advance(PipelineState::Extracting);
        let text = match await_text(self.extractor.recognize(image)).await {
            Ok(text) => text,
            Err(reason) => {
                run.advance(PipelineState::Failed);
                return Err(ScoreError::Extraction(reason));
            }
        };
        debug!(chars = text.len(), "receipt text extracted");

        run.advance(PipelineState::Scoring);
        let prompt = build_prompt(&text);
        let reply = complete_with_backoff(
            self.completions.as_ref(),
            &prompt,
            self.policy,
            |event| match event {
                Backoff::Waiting { attempt, delay } => {
                    debug!(attempt, wait_ms = delay.as_millis() as u64, "scoring paused");
                    run.advance(PipelineState::RetryWaiting);
                }
                Backoff::Resumed { attempt } => {
                    debug!(attempt, "scoring resumed");
                    run.advance(PipelineState::Scoring);
                }
            },
        )
        .await;

        let result = match reply
            .map_err(|e| match e {
                LlmError::RateLimited => ScoreError::RateLimited {
                    attempts: self.policy.max_attempts.max(1),
                },
                other => ScoreError::Llm(other),
            })
            .and_then(|content| parse_score_reply(&content).map_err(ScoreError::from))
        {
            Ok(result) => result,
            Err(e) => {
                run.advance(PipelineState::Failed);
                return Err(e);
            }
        };
        run.advance(PipelineState::Scored);

        run.advance(PipelineState::Saving);
        let receipt = match self.store.append(email, result.score).await {
            Ok(receipt) => receipt,
            Err(e) => {
                run.advance(PipelineState::Failed);
                return Err(e.into());
            }
        };
        run.advance(PipelineState::Saved);

        info!(score = result.score, retries = run.retries(), "receipt scored and saved");
        Ok(ScoredReceipt { result, receipt })
    }
}
