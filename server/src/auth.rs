use axum::{
    Json, RequestPartsExt,
    extract::FromRequestParts,
    http::{HeaderName, HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{self, Header},
};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::AppState;

static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Value of the `X-API-Key` request header.
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

impl Header for ApiKey {
    fn name() -> &'static HeaderName {
        &X_API_KEY
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let key = value.to_str().map_err(|_| headers::Error::invalid())?;
        Ok(ApiKey(key.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// Proof that the request carried the shared secret. Handlers take this as
/// their first extractor so the check runs before the body is touched.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

impl FromRequestParts<AppState> for Authorized {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();

        let TypedHeader(ApiKey(key)) = parts
            .extract::<TypedHeader<ApiKey>>()
            .await
            .map_err(|rejection| {
                tracing::warn!("Unauthorized request to {}", path);
                if rejection.is_missing() {
                    AuthError::MissingKey
                } else {
                    AuthError::InvalidKey
                }
            })?;

        if !secure_compare(&key, &state.config.api_key) {
            tracing::warn!("Unauthorized request to {}", path);
            return Err(AuthError::InvalidKey);
        }

        Ok(Authorized)
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = match self {
            AuthError::MissingKey => "missing_api_key",
            AuthError::InvalidKey => "invalid_api_key",
        };
        let body = Json(json!({
            "error": "Missing or invalid API key",
            "code": code,
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
