use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use lilac_contracts::requests::{GEMINI_GENERATE_PATH, OPENAI_GENERATE_PATH};
use lilac_contracts::{GenerateBody, ProviderSelector, RelayResponse};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::relay::Relay;
use crate::request::RelayRequest;

pub const MAX_BODY_SIZE_50MB: usize = 50 * 1024 * 1024;
pub const BANNER: &str = "Lilac AI Chatbot Server is running!";

pub fn router(relay: Arc<Relay>, cors_origin: &str) -> AnyResult<Router> {
    let origin = HeaderValue::from_str(cors_origin)
        .with_context(|| format!("invalid CORS origin '{cors_origin}'"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
        .route(OPENAI_GENERATE_PATH, post(generate_openai))
        .route(GEMINI_GENERATE_PATH, post(generate_gemini))
        .with_state(relay)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE_50MB))
        .layer(cors))
}

pub async fn serve(config: &RelayConfig, relay: Relay) -> AnyResult<()> {
    let providers = relay.provider_names();
    let app = router(Arc::new(relay), &config.cors_origin)?;
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(?providers, cors_origin = %config.cors_origin, "relay listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .context("relay server stopped")?;
    Ok(())
}

async fn banner() -> &'static str {
    BANNER
}

async fn health_check(State(relay): State<Arc<Relay>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "lilac-relay",
        "providers": relay.provider_names(),
    }))
}

async fn generate_openai(
    State(relay): State<Arc<Relay>>,
    body: std::result::Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<RelayResponse>> {
    relay_generate(&relay, ProviderSelector::OpenAi, body).await
}

async fn generate_gemini(
    State(relay): State<Arc<Relay>>,
    body: std::result::Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<RelayResponse>> {
    relay_generate(&relay, ProviderSelector::Gemini, body).await
}

async fn relay_generate(
    relay: &Relay,
    selector: ProviderSelector,
    body: std::result::Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<RelayResponse>> {
    let Json(body) = body.map_err(|rejection| {
        RelayError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let request = RelayRequest::validate(selector, body).map_err(|err| {
        tracing::warn!(provider = selector.as_str(), error = %err, "rejected request");
        err
    })?;
    let result = relay.handle(request).await?;
    Ok(Json(result.to_response()))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use lilac_contracts::ImageRef;
    use tower::ServiceExt;

    use super::*;

    const ORIGIN: &str = "http://localhost:5173";

    fn app(relay: Relay) -> anyhow::Result<Router> {
        router(Arc::new(relay), ORIGIN)
    }

    fn post_json(uri: &str, body: &str) -> anyhow::Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?)
    }

    async fn json_body(response: Response) -> anyhow::Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn banner_and_health() -> anyhow::Result<()> {
        let response = app(Relay::offline())?
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&bytes[..], BANNER.as_bytes());

        let response = app(Relay::offline())?
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(
            json_body(response).await?,
            json!({ "status": "healthy", "service": "lilac-relay", "providers": ["gemini", "openai"] })
        );
        Ok(())
    }

    #[tokio::test]
    async fn openai_route_returns_image_and_caption() -> anyhow::Result<()> {
        let response = app(Relay::offline())?
            .oneshot(post_json(
                OPENAI_GENERATE_PATH,
                r#"{"prompt":"a red circle","quality":"high"}"#,
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["mimeType"], json!("image/png"));
        assert_eq!(
            body["text"],
            json!("Generated image based on prompt: \"a red circle\" (Quality: high)")
        );
        let image = body["image"].as_str().unwrap_or_default();
        let decoded = ImageRef::from_base64("image/png", image)?;
        assert!(!decoded.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn openai_route_requires_prompt() -> anyhow::Result<()> {
        let response = app(Relay::offline())?
            .oneshot(post_json(
                OPENAI_GENERATE_PATH,
                r#"{"prompt":"   ","imageContextUrls":["data:image/png;base64,iVBORw0KGgoAAAAA"]}"#,
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await?,
            json!({ "success": false, "message": "Prompt is required." })
        );
        Ok(())
    }

    #[tokio::test]
    async fn gemini_route_accepts_context_only() -> anyhow::Result<()> {
        let response = app(Relay::offline())?
            .oneshot(post_json(
                GEMINI_GENERATE_PATH,
                r#"{"imageContextUrls":["data:image/png;base64,iVBORw0KGgoAAAAA"]}"#,
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["text"], json!("Edited image using 1 context image(s)."));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() -> anyhow::Result<()> {
        let response = app(Relay::offline())?
            .oneshot(post_json(GEMINI_GENERATE_PATH, "{not json")?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await?;
        assert_eq!(body["success"], json!(false));
        assert!(body["message"]
            .as_str()
            .map(|message| message.starts_with("Invalid request body"))
            .unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_provider_is_service_unavailable() -> anyhow::Result<()> {
        let response = app(Relay::new())?
            .oneshot(post_json(GEMINI_GENERATE_PATH, r#"{"prompt":"a fox"}"#)?)
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await?;
        assert_eq!(body["message"], json!("Gemini is not configured on this relay."));
        Ok(())
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() -> anyhow::Result<()> {
        let response = app(Relay::offline())?
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, ORIGIN)
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some(ORIGIN)
        );
        Ok(())
    }
}
