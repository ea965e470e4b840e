use serde::{Deserialize, Serialize};

use crate::receipts::services::is_valid_score;

/// Structured reply of the scoring model. Only `score` is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: f64,
    pub score_summary: String,
    pub recommendations: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("reply is not the expected JSON object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("score {0} is outside 0..=100")]
    OutOfRange(f64),
}

/// Strict parse of the completion content. Anything but a JSON object with
/// all three fields and an in-range score is rejected as a whole.
pub fn parse_score_reply(content: &str) -> Result<ScoreResult, ParseError> {
    let result: ScoreResult = serde_json::from_str(content.trim())?;
    if !is_valid_score(result.score) {
        return Err(ParseError::OutOfRange(result.score));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        let r = parse_score_reply(
            r#"{"score":72,"scoreSummary":"ok","recommendations":"buy less meat"}"#,
        )
        .unwrap();
        assert_eq!(r.score, 72.0);
        assert_eq!(r.score_summary, "ok");
        assert_eq!(r.recommendations, "buy less meat");
    }

    #[test]
    fn non_json_reply_is_rejected() {
        let err = parse_score_reply("Carbon footprint score: 38\nReason: too much meat").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn missing_field_is_rejected() {
        let err = parse_score_reply(r#"{"score":72,"scoreSummary":"ok"}"#).unwrap_err();
        assert!(err.to_string().contains("recommendations"));
    }

    #[test]
    fn fenced_json_is_not_salvaged() {
        let fenced = "```json\n{\"score\":72,\"scoreSummary\":\"ok\",\"recommendations\":\"x\"}\n```";
        assert!(parse_score_reply(fenced).is_err());
    }

    #[test]
    fn string_score_and_out_of_range_score_are_rejected() {
        assert!(parse_score_reply(
            r#"{"score":"72","scoreSummary":"ok","recommendations":"x"}"#
        )
        .is_err());
        let err = parse_score_reply(r#"{"score":140,"scoreSummary":"ok","recommendations":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::OutOfRange(s) if s == 140.0));
    }
}
