use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageRefError {
    #[error("not a data URL (expected 'data:<mime>;base64,<payload>')")]
    NotDataUrl,
    #[error("data URL is not base64 encoded")]
    NotBase64,
    #[error("data URL payload is empty")]
    EmptyPayload,
    #[error("invalid base64 payload: {0}")]
    Decode(String),
}

/// Self-describing image payload: MIME type plus raw bytes.
///
/// Serializes as a data URL so the same value doubles as the wire form.
/// Clones share the byte buffer, which keeps context snapshots cheap.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl ImageRef {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_IMAGE_MIME.to_string()
        } else {
            mime_type.trim().to_ascii_lowercase()
        };
        Self {
            mime_type,
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self, ImageRefError> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Err(ImageRefError::EmptyPayload);
        }
        let bytes = BASE64
            .decode(trimmed.as_bytes())
            .map_err(|err| ImageRefError::Decode(err.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageRefError::EmptyPayload);
        }
        Ok(Self::new(mime_type, bytes))
    }

    pub fn from_data_url(raw: &str) -> Result<Self, ImageRefError> {
        let tail = raw
            .trim()
            .strip_prefix("data:")
            .ok_or(ImageRefError::NotDataUrl)?;
        let (header, payload) = tail.split_once(',').ok_or(ImageRefError::NotDataUrl)?;
        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default();
        if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
            return Err(ImageRefError::NotBase64);
        }
        Self::from_base64(mime_type, payload)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRef")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl TryFrom<String> for ImageRef {
    type Error = ImageRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_data_url(&value)
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.to_data_url()
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.trim().to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// File name used when saving a generated image, e.g. `ai-image-20250101-093000.png`.
pub fn download_file_name(now: DateTime<Local>, image: &ImageRef) -> String {
    format!(
        "ai-image-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        image.extension()
    )
}
