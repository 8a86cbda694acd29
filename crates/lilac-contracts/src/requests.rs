use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::images::{ImageRef, DEFAULT_IMAGE_MIME};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Auto, Quality::Low, Quality::Medium, Quality::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Auto => "auto",
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    /// Value to forward to a provider; `None` means "let the provider choose".
    pub fn provider_value(self) -> Option<&'static str> {
        match self {
            Quality::Auto => None,
            other => Some(other.as_str()),
        }
    }

    /// Unknown or missing values fall back to `auto` with a warning instead of failing.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Quality::Auto;
        };
        match raw.parse() {
            Ok(quality) => quality,
            Err(_) => {
                tracing::warn!(value = raw, "invalid quality value; defaulting to 'auto'");
                Quality::Auto
            }
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Quality::ALL
            .into_iter()
            .find(|quality| quality.as_str() == normalized)
            .ok_or_else(|| format!("unknown quality '{value}' (expected auto, low, medium, high)"))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelector {
    #[default]
    OpenAi,
    Gemini,
}

pub const OPENAI_GENERATE_PATH: &str = "/api/generate";
pub const GEMINI_GENERATE_PATH: &str = "/api/generate-gemini";

impl ProviderSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderSelector::OpenAi => "openai",
            ProviderSelector::Gemini => "gemini",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProviderSelector::OpenAi => "OpenAI",
            ProviderSelector::Gemini => "Gemini",
        }
    }

    pub fn endpoint_path(self) -> &'static str {
        match self {
            ProviderSelector::OpenAi => OPENAI_GENERATE_PATH,
            ProviderSelector::Gemini => GEMINI_GENERATE_PATH,
        }
    }

    pub fn forwards_quality(self) -> bool {
        matches!(self, ProviderSelector::OpenAi)
    }
}

impl FromStr for ProviderSelector {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" | "gpt-image" => Ok(ProviderSelector::OpenAi),
            "gemini" | "google" | "vertex" => Ok(ProviderSelector::Gemini),
            other => Err(format!("unknown provider '{other}' (expected openai, gemini)")),
        }
    }
}

impl fmt::Display for ProviderSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One send action, frozen at compose time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt_text: String,
    context_images: Vec<ImageRef>,
    quality: Quality,
    provider: ProviderSelector,
}

impl GenerationRequest {
    pub(crate) fn new(
        prompt_text: String,
        context_images: Vec<ImageRef>,
        quality: Quality,
        provider: ProviderSelector,
    ) -> Self {
        Self {
            prompt_text,
            context_images,
            quality,
            provider,
        }
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn context_images(&self) -> &[ImageRef] {
        &self.context_images
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn provider(&self) -> ProviderSelector {
        self.provider
    }

    pub fn endpoint_path(&self) -> &'static str {
        self.provider.endpoint_path()
    }

    pub fn to_body(&self) -> GenerateBody {
        GenerateBody {
            prompt: Some(self.prompt_text.clone()),
            image_context_urls: if self.context_images.is_empty() {
                None
            } else {
                Some(
                    self.context_images
                        .iter()
                        .map(ImageRef::to_data_url)
                        .collect(),
                )
            },
            quality: self
                .provider
                .forwards_quality()
                .then(|| self.quality.as_str().to_string()),
        }
    }
}

/// JSON body accepted by both relay endpoints.
///
/// Fields stay loosely typed here; the relay validates them into a
/// provider-specific request before dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_context_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// JSON body returned by the relay for success and failure alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RelayResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub success: bool,
    pub text: Option<String>,
    pub image: Option<ImageRef>,
    pub error_message: Option<String>,
}

impl GenerationResult {
    pub fn success(text: Option<String>, image: Option<ImageRef>) -> Self {
        Self {
            success: true,
            text,
            image,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            image: None,
            error_message: Some(message.into()),
        }
    }

    pub fn to_response(&self) -> RelayResponse {
        if !self.success {
            return RelayResponse::failure(
                self.error_message
                    .clone()
                    .unwrap_or_else(|| "The backend failed to process the request.".to_string()),
            );
        }
        RelayResponse {
            success: true,
            image: self.image.as_ref().map(ImageRef::to_base64),
            mime_type: self.image.as_ref().map(|image| image.mime_type().to_string()),
            text: self.text.clone(),
            message: None,
        }
    }

    /// Reads a relay response; the image payload is raw base64 and defaults to PNG.
    pub fn from_response(response: RelayResponse) -> Self {
        if !response.success {
            return Self::failure(
                response
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "The backend failed to process the request.".to_string()),
            );
        }
        let mime_type = response
            .mime_type
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
        let image = match response.image.as_deref() {
            Some(payload) if !payload.trim().is_empty() => {
                match ImageRef::from_base64(&mime_type, payload) {
                    Ok(image) => Some(image),
                    Err(err) => {
                        return Self::failure(format!("relay returned an unreadable image: {err}"))
                    }
                }
            }
            _ => None,
        };
        let text = response.text.filter(|text| !text.trim().is_empty());
        if image.is_none() && text.is_none() {
            return Self::failure("The backend returned neither text nor an image.");
        }
        Self::success(text, image)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn quality_parsing_is_lenient() {
        assert_eq!(Quality::parse_lenient(Some("HIGH")), Quality::High);
        assert_eq!(Quality::parse_lenient(Some(" low ")), Quality::Low);
        assert_eq!(Quality::parse_lenient(Some("ultra")), Quality::Auto);
        assert_eq!(Quality::parse_lenient(Some("")), Quality::Auto);
        assert_eq!(Quality::parse_lenient(None), Quality::Auto);
    }

    #[test]
    fn auto_quality_is_not_forwarded() {
        assert_eq!(Quality::Auto.provider_value(), None);
        assert_eq!(Quality::Medium.provider_value(), Some("medium"));
    }

    #[test]
    fn provider_selector_parses_aliases() {
        assert_eq!(
            "OpenAI".parse::<ProviderSelector>(),
            Ok(ProviderSelector::OpenAi)
        );
        assert_eq!(
            "vertex".parse::<ProviderSelector>(),
            Ok(ProviderSelector::Gemini)
        );
        assert!("midjourney".parse::<ProviderSelector>().is_err());
        assert_eq!(ProviderSelector::Gemini.endpoint_path(), "/api/generate-gemini");
    }

    #[test]
    fn body_serializes_camel_case_and_omits_empty_context() -> anyhow::Result<()> {
        let request = GenerationRequest::new(
            "a red circle".to_string(),
            Vec::new(),
            Quality::Auto,
            ProviderSelector::OpenAi,
        );
        let value = serde_json::to_value(request.to_body())?;
        assert_eq!(value, json!({ "prompt": "a red circle", "quality": "auto" }));

        let request = GenerationRequest::new(
            String::new(),
            vec![ImageRef::new("image/png", vec![1, 2, 3])],
            Quality::High,
            ProviderSelector::Gemini,
        );
        let value = serde_json::to_value(request.to_body())?;
        assert_eq!(
            value,
            json!({ "prompt": "", "imageContextUrls": ["data:image/png;base64,AQID"] })
        );
        Ok(())
    }

    #[test]
    fn failure_response_omits_success_fields() -> anyhow::Result<()> {
        let value = serde_json::to_value(RelayResponse::failure("Prompt is required."))?;
        assert_eq!(
            value,
            json!({ "success": false, "message": "Prompt is required." })
        );
        Ok(())
    }

    #[test]
    fn result_from_response_decodes_png_by_default() {
        let response: RelayResponse = serde_json::from_value(json!({
            "success": true,
            "image": "AQID",
            "text": "Generated image",
        }))
        .unwrap_or_default();
        let result = GenerationResult::from_response(response);
        assert!(result.success);
        let image = result.image.unwrap_or_else(|| ImageRef::new("", Vec::<u8>::new()));
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes(), &[1, 2, 3]);
        assert_eq!(result.text.as_deref(), Some("Generated image"));
    }

    #[test]
    fn result_from_failure_response_keeps_message() {
        let result = GenerationResult::from_response(RelayResponse::failure("quota exceeded"));
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn result_round_trips_through_response() -> anyhow::Result<()> {
        let result = GenerationResult::success(
            Some("caption".to_string()),
            Some(ImageRef::new("image/jpeg", vec![4, 5, 6])),
        );
        let wire: Value = serde_json::to_value(result.to_response())?;
        assert_eq!(wire["mimeType"], json!("image/jpeg"));
        let parsed = GenerationResult::from_response(serde_json::from_value(wire)?);
        assert_eq!(parsed, result);
        Ok(())
    }
}
