use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lilac_contracts::RelayResponse;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Every way a relay request can end without a usable result.
///
/// All variants are terminal for the request; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Conversion(String),
    #[error("{message}")]
    Provider { status: Option<u16>, message: String },
    #[error("{0}")]
    EmptyResult(String),
    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) | RelayError::Conversion(_) => StatusCode::BAD_REQUEST,
            RelayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Provider {
                status: Some(code), ..
            } => StatusCode::from_u16(*code)
                .ok()
                .filter(|status| status.is_client_error() || status.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            RelayError::Provider { status: None, .. }
            | RelayError::EmptyResult(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation",
            RelayError::Unavailable(_) => "unavailable",
            RelayError::Conversion(_) => "conversion",
            RelayError::Provider { .. } => "provider",
            RelayError::EmptyResult(_) => "empty_result",
            RelayError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(RelayResponse::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(
            RelayError::Validation("Prompt is required.".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::Unavailable("no key".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::Conversion("bad data url".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::EmptyResult("nothing".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn provider_status_is_mirrored_when_it_is_an_error_code() {
        let limited = RelayError::Provider {
            status: Some(429),
            message: "rate limited".into(),
        };
        assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let odd = RelayError::Provider {
            status: Some(200),
            message: "unexpected shape".into(),
        };
        assert_eq!(odd.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let transport = RelayError::Provider {
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(transport.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
