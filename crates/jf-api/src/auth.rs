use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: String,
}

/// Marker extractor: present in a handler's arguments means the request
/// carried the configured API key.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser;

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);
        authorize_api_key(parts, &config)
    }
}

fn authorize_api_key(parts: &Parts, config: &AuthConfig) -> Result<AuthUser, ApiError> {
    let provided = parts
        .headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-API-Key header".into()))?;

    if !constant_time_eq(provided.as_bytes(), config.api_key.as_bytes()) {
        return Err(ApiError::Unauthorized("invalid API key".into()));
    }

    Ok(AuthUser)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_key(key: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/countries");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn config() -> AuthConfig {
        AuthConfig {
            api_key: "secret".into(),
        }
    }

    #[test]
    fn accepts_matching_key() {
        assert!(authorize_api_key(&parts_with_key(Some("secret")), &config()).is_ok());
    }

    #[test]
    fn rejects_missing_or_wrong_key() {
        assert!(matches!(
            authorize_api_key(&parts_with_key(None), &config()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize_api_key(&parts_with_key(Some("secreT")), &config()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize_api_key(&parts_with_key(Some("secret-longer")), &config()),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
