//! Receipt text extraction.
//!
//! An extractor turns an image into a lazy stream of [`OcrEvent`]s that ends
//! in either `Done(text)` or `Failed(reason)`.

pub mod image;
pub mod tesseract;

use tokio::sync::mpsc;
use tracing::debug;

pub use image::ImageBuffer;
pub use tesseract::TesseractExtractor;

#[derive(Debug, Clone, PartialEq)]
pub enum OcrEvent {
    Progress { status: String, progress: f32 },
    Done(String),
    Failed(String),
}

impl OcrEvent {
    pub fn progress(status: &str, progress: f32) -> Self {
        Self::Progress {
            status: status.to_string(),
            progress,
        }
    }
}

pub trait TextExtractor: Send + Sync {
    fn recognize(&self, image: ImageBuffer) -> mpsc::Receiver<OcrEvent>;
}

/// Drains progress events until a terminal one arrives.
/// A stream that closes without `Done`/`Failed` counts as a failure.
pub async fn await_text(mut events: mpsc::Receiver<OcrEvent>) -> Result<String, String> {
    while let Some(event) = events.recv().await {
        match event {
            OcrEvent::Progress { status, progress } => {
                debug!(%status, progress, "ocr progress");
            }
            OcrEvent::Done(text) => return Ok(text),
            OcrEvent::Failed(reason) => return Err(reason),
        }
    }
    Err("ocr stream ended without a result".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(events: Vec<OcrEvent>) -> mpsc::Receiver<OcrEvent> {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for ev in events {
            tx.try_send(ev).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn returns_text_after_progress() {
        let rx = stream(vec![
            OcrEvent::progress("loading image", 0.0),
            OcrEvent::progress("recognizing text", 0.5),
            OcrEvent::Done("MILK 2.99".into()),
        ]);
        assert_eq!(await_text(rx).await, Ok("MILK 2.99".to_string()));
    }

    #[tokio::test]
    async fn empty_text_is_still_success() {
        let rx = stream(vec![OcrEvent::Done(String::new())]);
        assert_eq!(await_text(rx).await, Ok(String::new()));
    }

    #[tokio::test]
    async fn failure_and_truncated_streams_are_errors() {
        let rx = stream(vec![OcrEvent::Failed("bad image".into())]);
        assert_eq!(await_text(rx).await, Err("bad image".to_string()));

        let rx = stream(vec![OcrEvent::progress("loading image", 0.0)]);
        assert!(await_text(rx).await.is_err());
    }
}
