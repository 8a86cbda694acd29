mod gemini;
mod offline;
mod openai;

use async_trait::async_trait;
use lilac_contracts::{ImageRef, Quality};
use reqwest::Response as HttpResponse;
use serde_json::Value;

use crate::convert::ContextImage;
use crate::error::{RelayError, Result};

pub use gemini::GeminiProvider;
pub use offline::OfflineProvider;
pub use openai::OpenAiProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub prompt: Option<String>,
    pub context: Vec<ContextImage>,
    pub quality: Quality,
}

impl ProviderRequest {
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }

    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    Generate,
    Edit,
}

/// Raw provider outcome before normalization: first text, first image, and
/// any block reason the provider surfaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOutput {
    pub text: Option<String>,
    pub image: Option<ImageRef>,
    pub block_reason: Option<String>,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn label(&self) -> &str;
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput>;
}

pub(crate) fn operation_for(request: &ProviderRequest) -> ProviderOperation {
    if request.has_context() {
        ProviderOperation::Edit
    } else {
        ProviderOperation::Generate
    }
}

/// Reads a provider response body, mapping non-2xx statuses to [`RelayError::Provider`].
pub(crate) async fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().await.map_err(|err| RelayError::Provider {
        status: Some(code),
        message: format!("{label} response body read failed: {err}"),
    })?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|payload| provider_error_message(&payload))
            .unwrap_or_else(|| truncate_text(body.trim(), 512));
        let detail = if detail.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown API error")
                .to_string()
        } else {
            detail
        };
        return Err(RelayError::Provider {
            status: Some(code),
            message: format!("{label} API Error ({code}): {detail}"),
        });
    }
    serde_json::from_str(&body).map_err(|err| RelayError::Provider {
        status: Some(code),
        message: format!("{label} returned invalid JSON payload: {err}"),
    })
}

/// Maps a transport failure (connect, timeout, TLS) to a provider error.
pub(crate) fn transport_error(label: &str, err: reqwest::Error) -> RelayError {
    let err = anyhow::Error::new(err).context(format!("{label} request failed"));
    RelayError::Provider {
        status: None,
        message: error_chain_text(&err, 1024),
    }
}

fn provider_error_message(payload: &Value) -> Option<String> {
    let error = payload.get("error")?;
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
