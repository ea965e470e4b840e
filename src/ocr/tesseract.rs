//! Tesseract OCR via the command-line binary.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use tokio::sync::mpsc;
use tracing::debug;

use super::image::ImageBuffer;
use super::{OcrEvent, TextExtractor};
use crate::config::OcrConfig;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("{0}")]
    NotAvailable(String),
    #[error("tesseract failed: {0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TesseractExtractor {
    config: OcrConfig,
}

impl TesseractExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn run(config: &OcrConfig, image: &ImageBuffer) -> Result<String, OcrError> {
        let mut file = tempfile::Builder::new()
            .prefix("receipt-")
            .suffix(&format!(".{}", image.extension()))
            .tempfile()?;
        file.write_all(&image.body)?;
        file.flush()?;
        run_tesseract(config, file.path())
    }
}

fn run_tesseract(config: &OcrConfig, image_path: &Path) -> Result<String, OcrError> {
    let output = Command::new(&config.tesseract_bin)
        .arg(image_path)
        .arg("stdout")
        .args(["-l", &config.language])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => Err(OcrError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::NotAvailable(
            format!("{} not found (install tesseract-ocr)", config.tesseract_bin),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

impl TextExtractor for TesseractExtractor {
    fn recognize(&self, image: ImageBuffer) -> mpsc::Receiver<OcrEvent> {
        let (tx, rx) = mpsc::channel(8);
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let _ = tx.blocking_send(OcrEvent::progress("loading image", 0.0));
            let _ = tx.blocking_send(OcrEvent::progress("recognizing text", 0.5));
            let last = match Self::run(&config, &image) {
                Ok(text) => {
                    let _ = tx.blocking_send(OcrEvent::progress("done", 1.0));
                    debug!(chars = text.len(), lang = %config.language, "tesseract finished");
                    OcrEvent::Done(text)
                }
                Err(e) => OcrEvent::Failed(e.to_string()),
            };
            let _ = tx.blocking_send(last);
        });

        rx
    }
}
