use async_trait::async_trait;
use lilac_contracts::ImageRef;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use super::{response_json_or_error, transport_error, ImageProvider, ProviderOutput, ProviderRequest};
use crate::config::{GeminiConfig, GeminiTransport};
use crate::error::{RelayError, Result};

/// Gemini multimodal `generateContent`, over the Generative Language API or Vertex AI.
pub struct GeminiProvider {
    transport: GeminiTransport,
    model: String,
    http: HttpClient,
    endpoint_override: Option<String>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, http: HttpClient) -> Self {
        Self {
            transport: config.transport,
            model: config.model,
            http,
            endpoint_override: None,
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint_override = Some(endpoint);
        self
    }

    fn endpoint(&self) -> String {
        if let Some(endpoint) = &self.endpoint_override {
            return endpoint.clone();
        }
        let model = self.model.trim().trim_start_matches("models/");
        match &self.transport {
            GeminiTransport::ApiKey { api_base, .. } => format!(
                "{}/models/{model}:generateContent",
                api_base.trim_end_matches('/')
            ),
            GeminiTransport::Vertex {
                project, location, ..
            } => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
            ),
        }
    }

    /// Context images first, in order, then the prompt text if there is one.
    fn build_parts(request: &ProviderRequest) -> Vec<Value> {
        let mut parts: Vec<Value> = request
            .context
            .iter()
            .map(|context| {
                json!({
                    "inlineData": {
                        "mimeType": context.mime_type(),
                        "data": context.image.to_base64(),
                    }
                })
            })
            .collect();
        let prompt = request.prompt_text().trim();
        if !prompt.is_empty() {
            parts.push(json!({ "text": prompt }));
        }
        parts
    }

    fn build_payload(request: &ProviderRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": Self::build_parts(request),
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
            },
        })
    }

    /// First text part and first inline image across all candidates, plus any block reason.
    fn extract_output(response_payload: &Value) -> Result<ProviderOutput> {
        let mut output = ProviderOutput::default();
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for candidate in &candidates {
            let parts = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in parts {
                if output.text.is_none() {
                    if let Some(text) = part
                        .get("text")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                    {
                        output.text = Some(text.to_string());
                        continue;
                    }
                }
                if output.image.is_none() {
                    let inline = part
                        .get("inlineData")
                        .or_else(|| part.get("inline_data"));
                    let data = inline
                        .and_then(|inline| inline.get("data"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if data.is_empty() {
                        continue;
                    }
                    let mime_type = inline
                        .and_then(|inline| inline.get("mimeType").or_else(|| inline.get("mime_type")))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let image = ImageRef::from_base64(mime_type, data).map_err(|err| {
                        RelayError::Provider {
                            status: None,
                            message: format!("Gemini image base64 decode failed: {err}"),
                        }
                    })?;
                    output.image = Some(image);
                }
            }
        }

        output.block_reason = response_payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                candidates.iter().find_map(|candidate| {
                    candidate
                        .get("finishReason")
                        .and_then(Value::as_str)
                        .filter(|reason| {
                            !matches!(*reason, "STOP" | "FINISH_REASON_UNSPECIFIED" | "MAX_TOKENS")
                        })
                        .map(str::to_string)
                })
            });
        Ok(output)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn label(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput> {
        if request.prompt_text().trim().is_empty() && !request.has_context() {
            return Err(RelayError::Validation(
                "Prompt or context image is required.".to_string(),
            ));
        }
        let endpoint = self.endpoint();
        let payload = Self::build_payload(request);
        tracing::info!(
            endpoint = %endpoint,
            images = request.context.len(),
            "calling Gemini generateContent"
        );
        let builder = self.http.post(&endpoint).json(&payload);
        let builder = match &self.transport {
            GeminiTransport::ApiKey { api_key, .. } => builder.query(&[("key", api_key)]),
            GeminiTransport::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };
        let response = builder
            .send()
            .await
            .map_err(|err| transport_error("Gemini", err))?;
        let response_payload = response_json_or_error("Gemini", response).await?;
        Self::extract_output(&response_payload)
    }
}
