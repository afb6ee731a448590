//! Caller identity.
//!
//! Identities are issued by an external provider; this service only resolves
//! them. Handlers take a [`MaybeUser`] and hand the inner `Option<Identity>`
//! to the image actions, which decide what an anonymous caller may do.

use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;

pub mod jwt;

pub use jwt::JwtIdentityProvider;

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Resolves the current caller from request headers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when the request carries no valid identity.
    async fn current_user(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Provider used when no verification secret is configured. Every caller is
/// anonymous.
pub struct Anonymous;

#[async_trait]
impl IdentityProvider for Anonymous {
    async fn current_user(&self, _headers: &HeaderMap) -> Option<Identity> {
        None
    }
}

/// The resolved identity of the caller, if any.
pub struct MaybeUser(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(state.identity.current_user(&parts.headers).await))
    }
}
