use async_trait::async_trait;
use lilac_contracts::ImageRef;
use reqwest::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::Client as HttpClient;
use serde_json::{json, Map, Value};

use super::{
    operation_for, response_json_or_error, transport_error, ImageProvider, ProviderOperation,
    ProviderOutput, ProviderRequest,
};
use crate::config::OpenAiConfig;
use crate::error::{RelayError, Result};

pub const OPENAI_IMAGE_SIZE: &str = "1024x1024";
pub const OPENAI_IMAGE_COUNT: u64 = 1;

/// OpenAI images API: `generations` without context, `edits` with it.
pub struct OpenAiProvider {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig, http: HttpClient) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
            http,
        }
    }

    /// Fields shared by both operations. `quality` is omitted for `auto`.
    fn base_fields(&self, request: &ProviderRequest) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("model".to_string(), Value::String(self.model.clone()));
        fields.insert(
            "prompt".to_string(),
            Value::String(request.prompt_text().to_string()),
        );
        fields.insert("n".to_string(), json!(OPENAI_IMAGE_COUNT));
        fields.insert(
            "size".to_string(),
            Value::String(OPENAI_IMAGE_SIZE.to_string()),
        );
        if let Some(quality) = request.quality.provider_value() {
            fields.insert("quality".to_string(), Value::String(quality.to_string()));
        }
        fields
    }

    async fn generate_image(&self, request: &ProviderRequest) -> Result<Value> {
        let endpoint = format!("{}/images/generations", self.api_base);
        let payload = Value::Object(self.base_fields(request));
        tracing::info!(endpoint = %endpoint, "calling OpenAI image generation");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| transport_error("OpenAI", err))?;
        response_json_or_error("OpenAI", response).await
    }

    async fn edit_image(&self, request: &ProviderRequest) -> Result<Value> {
        let endpoint = format!("{}/images/edits", self.api_base);
        let mut form = MultipartForm::new();
        for (key, value) in self.base_fields(request) {
            form = form.text(key, json_value_to_form_text(&value));
        }
        for context in &request.context {
            let part = MultipartPart::bytes(context.image.bytes().to_vec())
                .file_name(context.file_name())
                .mime_str(context.mime_type())
                .map_err(|err| {
                    RelayError::Conversion(format!(
                        "invalid MIME type '{}' for context image {}: {err}",
                        context.mime_type(),
                        context.index
                    ))
                })?;
            form = form.part("image[]", part);
        }
        tracing::info!(
            endpoint = %endpoint,
            images = request.context.len(),
            "calling OpenAI image edit"
        );
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| transport_error("OpenAI edits", err))?;
        response_json_or_error("OpenAI", response).await
    }

    async fn extract_first_image(&self, response_payload: &Value) -> Result<Option<ImageRef>> {
        let rows = response_payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in rows {
            if let Some(b64) = row
                .get("b64_json")
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
            {
                let output_format = response_payload
                    .get("output_format")
                    .and_then(Value::as_str)
                    .unwrap_or("png");
                let image = ImageRef::from_base64(&format!("image/{output_format}"), b64)
                    .map_err(|err| RelayError::Provider {
                        status: None,
                        message: format!("OpenAI image base64 decode failed: {err}"),
                    })?;
                return Ok(Some(image));
            }
            if let Some(url) = row.get("url").and_then(Value::as_str) {
                return self.download_image(url).await.map(Some);
            }
        }
        Ok(None)
    }

    async fn download_image(&self, url: &str) -> Result<ImageRef> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| transport_error("OpenAI image download", err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Provider {
                status: Some(status.as_u16()),
                message: format!("provider image download failed ({})", status.as_u16()),
            });
        }
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error("OpenAI image download", err))?;
        Ok(ImageRef::new(mime_type, bytes.to_vec()))
    }
}

#[async_trait]
impl ImageProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn label(&self) -> &str {
        "OpenAI"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput> {
        let response_payload = match operation_for(request) {
            ProviderOperation::Edit => self.edit_image(request).await?,
            ProviderOperation::Generate => self.generate_image(request).await?,
        };
        let image = self.extract_first_image(&response_payload).await?;
        if image.is_none() {
            tracing::error!("unexpected response structure from OpenAI images API");
        }
        Ok(ProviderOutput {
            text: None,
            image,
            block_reason: None,
        })
    }
}

fn json_value_to_form_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
