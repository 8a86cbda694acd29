use std::time::Duration;

use anyhow::{Context, Result};
use lilac_contracts::{GenerationRequest, GenerationResult, RelayResponse};
use reqwest::Client as HttpClient;

pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001";

/// Talks to a running relay on behalf of the chat session.
///
/// Every outcome comes back as a [`GenerationResult`]; transport and HTTP
/// failures become failed results with a readable message.
pub struct RelayClient {
    base_url: String,
    http: HttpClient,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build relay HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send(&self, request: &GenerationRequest) -> GenerationResult {
        let url = format!("{}{}", self.base_url, request.endpoint_path());
        tracing::info!(
            url = %url,
            context_images = request.context_images().len(),
            quality = %request.quality(),
            "sending generation request"
        );
        let response = match self.http.post(&url).json(&request.to_body()).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "relay unreachable");
                return GenerationResult::failure(format!("Network Error: {err}"));
            }
        };

        let status = response.status();
        let body = response.json::<RelayResponse>().await;
        if !status.is_success() {
            let message = body
                .ok()
                .and_then(|body| body.message)
                .filter(|message| !message.trim().is_empty())
                .map(|message| format!("Error: {message}"))
                .unwrap_or_else(|| {
                    format!(
                        "Error from server: {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or_default()
                    )
                    .trim_end()
                    .to_string()
                });
            tracing::warn!(status = status.as_u16(), %message, "relay returned an error");
            return GenerationResult::failure(message);
        }
        match body {
            Ok(body) => GenerationResult::from_response(body),
            Err(err) => GenerationResult::failure(format!("Network Error: unreadable relay response: {err}")),
        }
    }
}
