use super::dto::ReceiptSummary;
use super::repo_types::Receipt;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

pub fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Two decimals, the precision scores are shown with.
pub fn round_for_display(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of all scores; `None` for an empty history.
pub fn average_score<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = scores
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Recomputes the average from the full history every time.
pub fn summarize(receipts: Vec<Receipt>) -> ReceiptSummary {
    let average = average_score(receipts.iter().map(|r| r.score)).map(round_for_display);
    ReceiptSummary {
        count: receipts.len(),
        average_score: average,
        receipts,
    }
}
