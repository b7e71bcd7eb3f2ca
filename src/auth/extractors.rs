use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use super::dto::Identity;
use super::provider::IdentityProvider;
use super::services::verify_bearer;
use crate::error::AppError;

fn authorization(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}

/// Verified caller; rejects the request with 401 otherwise.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn IdentityProvider>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let provider = <Arc<dyn IdentityProvider> as FromRef<S>>::from_ref(state);
        let identity = verify_bearer(provider.as_ref(), authorization(parts)).await?;
        Ok(AuthUser(identity))
    }
}

/// Caller identity when a valid token is present; anonymous otherwise.
/// Never rejects.
pub struct MaybeAuthUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<dyn IdentityProvider>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = authorization(parts);
        if header.is_none() {
            return Ok(MaybeAuthUser(None));
        }
        let provider = <Arc<dyn IdentityProvider> as FromRef<S>>::from_ref(state);
        Ok(MaybeAuthUser(
            verify_bearer(provider.as_ref(), header).await.ok(),
        ))
    }
}
