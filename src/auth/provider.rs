use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_sdk_cognitoidentityprovider::{
    config::Region,
    types::{AuthFlowType, AuthenticationResultType},
    Client,
};
use tracing::debug;

use super::dto::{AuthTokens, ProviderUser};
use crate::config::CognitoConfig;

/// The external identity provider. Nothing here keeps local state; each call
/// is a relay to the provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, access_token: &str) -> anyhow::Result<ProviderUser>;
    async fn sign_in(&self, username: &str, password: &str) -> anyhow::Result<AuthTokens>;
    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<AuthTokens>;
    /// Invalidates every token issued to the user.
    async fn global_sign_out(&self, access_token: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct CognitoProvider {
    client: Client,
    client_id: String,
}

impl CognitoProvider {
    pub async fn new(config: &CognitoConfig) -> Self {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Self {
            client: Client::new(&shared),
            client_id: config.client_id.clone(),
        }
    }

    async fn initiate_auth(
        &self,
        flow: AuthFlowType,
        params: &[(&str, &str)],
    ) -> anyhow::Result<AuthTokens> {
        let mut req = self
            .client
            .initiate_auth()
            .auth_flow(flow)
            .client_id(&self.client_id);
        for (key, value) in params {
            req = req.auth_parameters(*key, *value);
        }
        let out = req.send().await.context("cognito initiate_auth")?;
        if let Some(challenge) = out.challenge_name() {
            anyhow::bail!("challenge required: {}", challenge.as_str());
        }
        out.authentication_result()
            .map(tokens_from)
            .context("missing authentication result")
    }
}

fn tokens_from(result: &AuthenticationResultType) -> AuthTokens {
    AuthTokens {
        access_token: result.access_token().map(str::to_string),
        id_token: result.id_token().map(str::to_string),
        refresh_token: result.refresh_token().map(str::to_string),
        expires_in: Some(result.expires_in()),
    }
}

#[async_trait]
impl IdentityProvider for CognitoProvider {
    async fn get_user(&self, access_token: &str) -> anyhow::Result<ProviderUser> {
        let out = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .context("cognito get_user")?;

        let attributes = out
            .user_attributes()
            .iter()
            .filter_map(|attr| {
                attr.value()
                    .map(|value| (attr.name().to_string(), value.to_string()))
            })
            .collect();

        debug!(username = %out.username(), "cognito user resolved");
        Ok(ProviderUser {
            username: out.username().to_string(),
            attributes,
        })
    }

    async fn sign_in(&self, username: &str, password: &str) -> anyhow::Result<AuthTokens> {
        self.initiate_auth(
            AuthFlowType::UserPasswordAuth,
            &[("USERNAME", username), ("PASSWORD", password)],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<AuthTokens> {
        let mut tokens = self
            .initiate_auth(
                AuthFlowType::RefreshTokenAuth,
                &[("REFRESH_TOKEN", refresh_token)],
            )
            .await?;
        tokens.refresh_token = None;
        Ok(tokens)
    }

    async fn global_sign_out(&self, access_token: &str) -> anyhow::Result<()> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .context("cognito global_sign_out")?;
        Ok(())
    }
}
