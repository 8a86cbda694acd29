use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use lilac_contracts::{GenerationResult, ProviderSelector};
use reqwest::Client as HttpClient;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::convert::decode_context_images;
use crate::error::{RelayError, Result};
use crate::normalize::{normalize_output, CaptionPolicy};
use crate::providers::{
    GeminiProvider, ImageProvider, OfflineProvider, OpenAiProvider, ProviderRequest,
};
use crate::request::RelayRequest;

/// Routes validated requests to the provider configured for each endpoint.
///
/// Holds no per-request state; share it behind an `Arc`.
#[derive(Default)]
pub struct Relay {
    providers: BTreeMap<&'static str, Arc<dyn ImageProvider>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers live providers for whichever credentials the config carries.
    pub fn from_config(config: &RelayConfig) -> AnyResult<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build provider HTTP client")?;
        let mut relay = Self::new();
        if let Some(openai) = &config.openai {
            relay.register(
                ProviderSelector::OpenAi,
                OpenAiProvider::new(openai.clone(), http.clone()),
            );
        }
        if let Some(gemini) = &config.gemini {
            relay.register(
                ProviderSelector::Gemini,
                GeminiProvider::new(gemini.clone(), http),
            );
        }
        if relay.providers.is_empty() {
            tracing::warn!("no provider credentials configured; every request will return 503");
        }
        Ok(relay)
    }

    /// Both endpoints served by the credential-free renderer.
    pub fn offline() -> Self {
        let mut relay = Self::new();
        for selector in [ProviderSelector::OpenAi, ProviderSelector::Gemini] {
            relay.register(
                selector,
                OfflineProvider::new(selector.as_str(), selector.label()),
            );
        }
        relay
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, selector: ProviderSelector, provider: P) {
        self.providers.insert(selector.as_str(), Arc::new(provider));
    }

    pub fn get(&self, selector: ProviderSelector) -> Option<&dyn ImageProvider> {
        self.providers
            .get(selector.as_str())
            .map(|provider| provider.as_ref())
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().map(|name| name.to_string()).collect()
    }

    pub async fn handle(&self, request: RelayRequest) -> Result<GenerationResult> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "relay_request",
            %request_id,
            provider = request.provider().as_str()
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: RelayRequest) -> Result<GenerationResult> {
        let selector = request.provider();
        let provider = self.get(selector).ok_or_else(|| {
            RelayError::Unavailable(format!("{} is not configured on this relay.", selector.label()))
        })?;

        let context = decode_context_images(request.context_urls()).await?;
        let context_count = context.len();
        let quality = request.quality();
        tracing::info!(
            context_images = context_count,
            quality = %quality,
            "dispatching generation request"
        );

        let policy = match &request {
            RelayRequest::OpenAi { quality, .. } => CaptionPolicy::Describe { quality: *quality },
            RelayRequest::Gemini { .. } => CaptionPolicy::FillMissing,
        };
        let provider_request = ProviderRequest {
            prompt: request.prompt().map(str::to_string),
            context,
            quality,
        };
        let output = provider
            .generate(&provider_request)
            .await
            .map_err(|err| {
                tracing::error!(kind = err.kind(), error = %err, "provider call failed");
                err
            })?;

        let result = normalize_output(
            provider.label(),
            provider_request.prompt.as_deref(),
            context_count,
            policy,
            output,
        )
        .map_err(|err| {
            tracing::error!(error = %err, "provider returned nothing usable");
            err
        })?;
        tracing::info!(
            has_text = result.text.is_some(),
            has_image = result.image.is_some(),
            "generation completed"
        );
        Ok(result)
    }
}
