use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::provider::{CognitoProvider, IdentityProvider};
use crate::catalog::repo::{MetricCatalog, PgMetricCatalog};
use crate::config::AppConfig;
use crate::db;
use crate::metrics::repo::{MetricRepository, PgMetricRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<dyn MetricRepository>,
    pub catalog: Arc<dyn MetricCatalog>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Connects the pool, runs migrations and wires the production collaborators.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let pool = db::connect(&config.database).await?;
        db::migrate(&pool).await?;

        let identity = Arc::new(CognitoProvider::new(&config.cognito).await) as Arc<dyn IdentityProvider>;
        tracing::info!(
            region = %config.cognito.region,
            user_pool_id = %config.cognito.user_pool_id,
            "identity provider configured"
        );

        Ok(Self {
            metrics: Arc::new(PgMetricRepository::new(pool.clone())),
            catalog: Arc::new(PgMetricCatalog::new(pool)),
            identity,
            config,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        metrics: Arc<dyn MetricRepository>,
        catalog: Arc<dyn MetricCatalog>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            metrics,
            catalog,
            identity,
        }
    }
}

impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}
