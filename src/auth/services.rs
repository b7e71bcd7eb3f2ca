use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::dto::{Identity, ProviderUser};
use super::provider::IdentityProvider;
use crate::config::CognitoConfig;
use crate::error::AppError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Returns the token of a `Bearer <token>` header, or `None` for any other shape.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
}

/// Flattens the provider's attribute list and lifts the well-known keys.
pub fn identity_from(user: ProviderUser) -> Identity {
    let attributes: std::collections::BTreeMap<String, String> =
        user.attributes.into_iter().collect();
    Identity {
        username: user.username,
        email: attributes.get("email").cloned(),
        email_verified: attributes.get("email_verified").map(String::as_str) == Some("true"),
        name: attributes.get("name").cloned(),
        picture: attributes.get("picture").cloned(),
        attributes,
    }
}

/// Resolves an `Authorization` header into an [`Identity`].
///
/// A malformed header is rejected before the provider is contacted. Every
/// provider failure collapses into [`AppError::InvalidToken`] so callers
/// cannot tell an expired token from a revoked one.
pub async fn verify_bearer(
    provider: &dyn IdentityProvider,
    header: Option<&str>,
) -> Result<Identity, AppError> {
    let token = bearer_token(header).ok_or(AppError::MissingCredentials)?;

    match provider.get_user(token).await {
        Ok(user) => Ok(identity_from(user)),
        Err(e) => {
            warn!(error = %e, "token verification failed");
            Err(AppError::InvalidToken)
        }
    }
}

/// Hosted UI authorize URL for Google federation, if a domain is configured.
pub fn hosted_ui_url(config: &CognitoConfig) -> Option<String> {
    let domain = config.domain.as_deref()?;
    Some(format!(
        "https://{domain}.auth.{region}.amazoncognito.com/oauth2/authorize?\
         client_id={client_id}&response_type=code&scope=email+openid+profile\
         &redirect_uri={redirect}&identity_provider=Google",
        region = config.region,
        client_id = urlencoding::encode(&config.client_id),
        redirect = urlencoding::encode(&config.redirect_uri),
    ))
}
