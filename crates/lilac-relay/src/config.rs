use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_IMAGE_MODEL: &str = "gpt-image-1";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";
pub const DEFAULT_VERTEX_LOCATION: &str = "us-central1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiTransport {
    /// Generative Language API, authenticated with `?key=`.
    ApiKey { api_base: String, api_key: String },
    /// Vertex AI publisher model endpoint, authenticated with a bearer token.
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub transport: GeminiTransport,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub request_timeout: Duration,
    pub openai: Option<OpenAiConfig>,
    pub gemini: Option<GeminiConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            openai: None,
            gemini: None,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_base = |key: &str, default: &str| {
            get(key)
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default.to_string())
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{raw}'"))?,
            None => DEFAULT_PORT,
        };
        let request_timeout = match get("RELAY_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().with_context(|| {
                format!("RELAY_REQUEST_TIMEOUT_SECS must be whole seconds, got '{raw}'")
            })?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let openai = get("OPENAI_API_KEY")
            .or_else(|| get("OPENAI_API_KEY_BACKUP"))
            .map(|api_key| OpenAiConfig {
                api_base: api_base("OPENAI_API_BASE", DEFAULT_OPENAI_API_BASE),
                api_key,
                model: get("OPENAI_IMAGE_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_IMAGE_MODEL.to_string()),
            });

        let vertex = match (get("GOOGLE_CLOUD_PROJECT"), get("VERTEX_ACCESS_TOKEN")) {
            (Some(project), Some(access_token)) => Some(GeminiTransport::Vertex {
                project,
                location: get("GOOGLE_CLOUD_LOCATION")
                    .unwrap_or_else(|| DEFAULT_VERTEX_LOCATION.to_string()),
                access_token,
            }),
            _ => None,
        };
        let transport = vertex.or_else(|| {
            get("GEMINI_API_KEY")
                .or_else(|| get("GOOGLE_API_KEY"))
                .map(|api_key| GeminiTransport::ApiKey {
                    api_base: api_base("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
                    api_key,
                })
        });
        let gemini = transport.map(|transport| GeminiConfig {
            transport,
            model: get("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_IMAGE_MODEL.to_string()),
        });

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            request_timeout,
            openai,
            gemini,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
