//! Converts domain errors into the `{ok:false, code, message, details?}`
//! envelope over HTTP, the way the teacher's `server.rs` turns `CreditError`
//! and friends into JSON error bodies (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use settld_gate::GateError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("gateway retry requires a buffered request body")]
    GatewayRetryRequiresBufferedBody,
    #[error("upstream response exceeded the buffered size cap")]
    GatewayResponseTooLarge,
    #[error("upstream request failed")]
    GatewayUpstreamError,
    #[error("x402 offer header missing or malformed")]
    OfferHeaderInvalid,
    #[error("webhook signature invalid")]
    WebhookSignatureInvalid,
    #[error("request is missing required authentication")]
    Unauthorized,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Gate(inner) => inner.code(),
            Self::GatewayRetryRequiresBufferedBody => "X402_GATEWAY_RETRY_REQUIRES_BUFFERED_BODY",
            Self::GatewayResponseTooLarge => "X402_GATEWAY_RESPONSE_TOO_LARGE",
            Self::GatewayUpstreamError => "X402_GATEWAY_ERROR",
            Self::OfferHeaderInvalid => "X402_OFFER_HEADER_INVALID",
            Self::WebhookSignatureInvalid => "WEBHOOK_SIGNATURE_INVALID",
            Self::Unauthorized => "UNAUTHORIZED",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        let status = match self {
            Self::Gate(inner) => inner.http_status(),
            Self::GatewayRetryRequiresBufferedBody
            | Self::GatewayResponseTooLarge
            | Self::GatewayUpstreamError => 502,
            Self::OfferHeaderInvalid => 400,
            Self::WebhookSignatureInvalid => 400,
            Self::Unauthorized => 401,
        };
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        let body = Json(json!({
            "ok": false,
            "code": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
