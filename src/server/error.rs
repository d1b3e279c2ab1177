//! JSON error responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::SwitchyardError;

impl IntoResponse for SwitchyardError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(kind = %self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = %self.kind(), error = %self, "request rejected");
        }

        let retry_after = match &self {
            Self::RateLimited { retry_after_ms, .. } => Some(retry_after_ms.div_ceil(1000).max(1)),
            _ => None,
        };
        let mut response = (status, Json(self.to_body())).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn renders_kind_and_status() {
        let response = SwitchyardError::ServerBusy {
            route: "run".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["kind"], "server_busy");
        assert!(value["error"].as_str().unwrap().contains("run"));
    }

    #[test]
    fn client_abort_uses_499_and_rate_limit_sets_retry_after() {
        assert_eq!(
            SwitchyardError::ClientAborted.into_response().status().as_u16(),
            499
        );

        let response = SwitchyardError::RateLimited {
            key: "1.2.3.4".into(),
            retry_after_ms: 1500,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
