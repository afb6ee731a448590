//! HS256 session tokens issued by the external identity provider.
//!
//! The token is read from `Authorization: Bearer <token>` or, for browser
//! form posts, from the `__session` cookie. The user id is the `sub` claim.

use super::{Identity, IdentityProvider};
use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SESSION_COOKIE: &str = "__session";

/// Claims the gallery relies on. Other claims are ignored.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn token_from_headers(headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned);

        bearer.or_else(|| {
            CookieJar::from_headers(headers)
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_owned())
        })
    }

    /// Verify and decode a token.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                debug!("rejected session token: {}", err);
                None
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn current_user(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = Self::token_from_headers(headers)?;
        let claims = self.verify(&token)?;
        if claims.sub.trim().is_empty() {
            return None;
        }
        Some(Identity::new(claims.sub))
    }
}

/// Sign a session token for `user_id`. Used by tests and local tooling; real
/// tokens come from the identity provider.
pub fn sign(secret: &[u8], user_id: &str, ttl_secs: u64) -> jsonwebtoken::errors::Result<String> {
    let exp = chrono::Utc::now().timestamp().max(0) as u64 + ttl_secs;
    let claims = Claims {
        sub: user_id.to_owned(),
        exp,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"test-secret";

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn resolves_bearer_token() {
        let provider = JwtIdentityProvider::new(SECRET);
        let token = sign(SECRET, "user_a", 60).unwrap();
        let headers = headers_with(header::AUTHORIZATION, &format!("Bearer {token}"));

        assert_eq!(
            provider.current_user(&headers).await,
            Some(Identity::new("user_a"))
        );
    }

    #[tokio::test]
    async fn resolves_session_cookie() {
        let provider = JwtIdentityProvider::new(SECRET);
        let token = sign(SECRET, "user_b", 60).unwrap();
        let headers = headers_with(header::COOKIE, &format!("theme=dark; __session={token}"));

        assert_eq!(
            provider.current_user(&headers).await,
            Some(Identity::new("user_b"))
        );
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let provider = JwtIdentityProvider::new(SECRET);
        let token = sign(b"other-secret", "user_a", 60).unwrap();
        let headers = headers_with(header::AUTHORIZATION, &format!("Bearer {token}"));

        assert_eq!(provider.current_user(&headers).await, None);
    }

    #[tokio::test]
    async fn missing_token_is_anonymous() {
        let provider = JwtIdentityProvider::new(SECRET);
        assert_eq!(provider.current_user(&HeaderMap::new()).await, None);
    }
}
