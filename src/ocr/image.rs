use base64::Engine;
use bytes::Bytes;

/// An uploaded receipt image held in memory for the length of one run.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image is empty")]
    Empty,
    #[error("invalid base64")]
    InvalidBase64,
    #[error("malformed data URL")]
    MalformedDataUrl,
}

impl ImageBuffer {
    pub fn new(body: Bytes, content_type: impl Into<String>) -> Result<Self, ImageError> {
        if body.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self {
            body,
            content_type: content_type.into(),
        })
    }

    /// Accepts either bare base64 or a `data:<mime>;base64,<payload>` URL.
    /// The data URL's mime type wins over `fallback_type`.
    pub fn from_base64(input: &str, fallback_type: Option<&str>) -> Result<Self, ImageError> {
        let input = input.trim();
        let (content_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest.split_once(',').ok_or(ImageError::MalformedDataUrl)?;
                let mime = meta
                    .strip_suffix(";base64")
                    .ok_or(ImageError::MalformedDataUrl)?;
                (mime.to_string(), payload)
            }
            None => (
                fallback_type.unwrap_or("application/octet-stream").to_string(),
                input,
            ),
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| ImageError::InvalidBase64)?;
        Self::new(Bytes::from(decoded), content_type)
    }

    pub fn extension(&self) -> &'static str {
        ext_from_mime(&self.content_type).unwrap_or("png")
    }
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/tiff" => Some("tif"),
        "image/bmp" => Some("bmp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
