use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use time::{macros::datetime, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use quantified_me::app::build_app;
use quantified_me::auth::dto::{AuthTokens, ProviderUser};
use quantified_me::auth::provider::IdentityProvider;
use quantified_me::catalog::repo::MetricCatalog;
use quantified_me::catalog::repo_types::{
    MetricCategory, MetricDataType, MetricType, MetricTypeWithCategory,
};
use quantified_me::config::AppConfig;
use quantified_me::metrics::repo::MetricRepository;
use quantified_me::metrics::repo_types::{HealthMetric, MetricStats, MetricWithType};
use quantified_me::metrics::validation::{MetricFilter, MetricPatch, NewMetric, StatsRange};
use quantified_me::state::AppState;

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";
pub const ALICE: &str = "alice-sub";
pub const BOB: &str = "bob-sub";

pub const SIGNIN_EMAIL: &str = "alice@example.com";
pub const SIGNIN_PASSWORD: &str = "correct-horse";
pub const REFRESH_TOKEN: &str = "refresh-ok";

fn seeded_types() -> Vec<MetricTypeWithCategory> {
    let created_at = datetime!(2024-01-01 0:00 UTC);
    let entry = |id, category_id, name: &str, display: &str, unit: &str, category: &str| {
        MetricTypeWithCategory {
            metric_type: MetricType {
                id,
                category_id,
                name: name.into(),
                display_name: display.into(),
                description: None,
                unit: unit.into(),
                data_type: MetricDataType::Decimal,
                min_value: Some(0.0),
                max_value: None,
                default_value: None,
                created_at,
            },
            category_name: category.into(),
            category_icon: None,
            category_color: Some("#10b981".into()),
        }
    };
    vec![
        entry(1, 1, "steps", "Steps", "steps", "Activity"),
        entry(2, 2, "weight", "Weight", "kg", "Body"),
        entry(3, 3, "resting_heart_rate", "Resting Heart Rate", "bpm", "Heart"),
    ]
}

/// In-memory metric store with the same owner scoping as the SQL statements.
#[derive(Default)]
pub struct FakeMetricRepository {
    rows: Mutex<Vec<HealthMetric>>,
}

impl FakeMetricRepository {
    #[allow(dead_code)]
    pub fn get(&self, id: Uuid) -> Option<HealthMetric> {
        self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned()
    }

    fn with_type(metric: HealthMetric) -> MetricWithType {
        let ty = seeded_types()
            .into_iter()
            .find(|t| t.metric_type.id == metric.metric_type_id)
            .unwrap_or_else(|| seeded_types().remove(0));
        MetricWithType {
            metric,
            metric_name: ty.metric_type.name,
            display_name: ty.metric_type.display_name,
            unit: ty.metric_type.unit,
            category_name: ty.category_name,
            category_color: ty.category_color,
        }
    }
}

fn in_range(at: OffsetDateTime, start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> bool {
    start.map_or(true, |s| at >= s) && end.map_or(true, |e| at <= e)
}

#[async_trait]
impl MetricRepository for FakeMetricRepository {
    async fn create(&self, user_id: &str, input: NewMetric) -> anyhow::Result<HealthMetric> {
        let now = OffsetDateTime::now_utc();
        let metric = HealthMetric {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            metric_type_id: input.metric_type_id,
            value: input.value,
            recorded_at: input.recorded_at,
            source: input.source,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(metric.clone());
        Ok(metric)
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        filter: &MetricFilter,
    ) -> anyhow::Result<Vec<MetricWithType>> {
        let mut rows: Vec<HealthMetric> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| filter.metric_type_id.map_or(true, |t| m.metric_type_id == t))
            .filter(|m| in_range(m.recorded_at, filter.start_date, filter.end_date))
            .filter(|m| filter.source.as_deref().map_or(true, |s| m.source == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        Ok(rows
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .map(Self::with_type)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid, user_id: &str) -> anyhow::Result<Option<MetricWithType>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id && m.user_id == user_id)
            .cloned()
            .map(Self::with_type))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: &str,
        patch: MetricPatch,
    ) -> anyhow::Result<Option<HealthMetric>> {
        if patch.is_empty() {
            return Ok(None);
        }
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|m| m.id == id && m.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(v) = patch.metric_type_id {
            row.metric_type_id = v;
        }
        if let Some(v) = patch.value {
            row.value = v;
        }
        if let Some(v) = patch.recorded_at {
            row.recorded_at = v;
        }
        if let Some(v) = patch.source {
            row.source = v;
        }
        if let Some(v) = patch.notes {
            row.notes = Some(v);
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| !(m.id == id && m.user_id == user_id));
        Ok(rows.len() != before)
    }

    async fn get_stats(
        &self,
        user_id: &str,
        metric_type_id: i32,
        range: &StatsRange,
    ) -> anyhow::Result<MetricStats> {
        let values: Vec<f64> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.metric_type_id == metric_type_id)
            .filter(|m| in_range(m.recorded_at, range.start_date, range.end_date))
            .map(|m| m.value)
            .collect();

        if values.is_empty() {
            return Ok(MetricStats {
                count: 0,
                average: None,
                min: None,
                max: None,
                std_dev: None,
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        // Sample standard deviation, as STDDEV computes it.
        let std_dev = (values.len() > 1).then(|| {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        });

        Ok(MetricStats {
            count: values.len() as i64,
            average: Some(mean),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            std_dev,
        })
    }
}

#[derive(Default)]
pub struct FakeCatalog;

#[async_trait]
impl MetricCatalog for FakeCatalog {
    async fn find_all(&self) -> anyhow::Result<Vec<MetricTypeWithCategory>> {
        Ok(seeded_types())
    }

    async fn find_by_category(
        &self,
        category: &str,
    ) -> anyhow::Result<Vec<MetricTypeWithCategory>> {
        Ok(seeded_types()
            .into_iter()
            .filter(|t| t.category_name == category)
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<MetricTypeWithCategory>> {
        Ok(seeded_types().into_iter().find(|t| t.metric_type.id == id))
    }

    async fn find_all_categories(&self) -> anyhow::Result<Vec<MetricCategory>> {
        let created_at = datetime!(2024-01-01 0:00 UTC);
        Ok(["Activity", "Body", "Heart"]
            .iter()
            .enumerate()
            .map(|(i, name)| MetricCategory {
                id: i as i32 + 1,
                name: name.to_string(),
                description: None,
                icon: None,
                color: None,
                created_at,
            })
            .collect())
    }
}

/// Token-to-user map standing in for the identity provider. Counts
/// `get_user` calls so tests can assert the provider was never reached.
pub struct FakeIdentityProvider {
    users: HashMap<String, ProviderUser>,
    pub get_user_calls: AtomicUsize,
    pub sign_outs: Mutex<Vec<String>>,
}

impl FakeIdentityProvider {
    fn new() -> Self {
        let user = |username: &str, email: &str| ProviderUser {
            username: username.to_string(),
            attributes: vec![
                ("email".into(), email.into()),
                ("email_verified".into(), "true".into()),
                ("name".into(), username.into()),
            ],
        };
        let mut users = HashMap::new();
        users.insert(ALICE_TOKEN.to_string(), user(ALICE, SIGNIN_EMAIL));
        users.insert(BOB_TOKEN.to_string(), user(BOB, "bob@example.com"));
        Self {
            users,
            get_user_calls: AtomicUsize::new(0),
            sign_outs: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn get_user(&self, access_token: &str) -> anyhow::Result<ProviderUser> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NotAuthorizedException: invalid access token"))
    }

    async fn sign_in(&self, username: &str, password: &str) -> anyhow::Result<AuthTokens> {
        if username == SIGNIN_EMAIL && password == SIGNIN_PASSWORD {
            Ok(AuthTokens {
                access_token: Some(ALICE_TOKEN.into()),
                id_token: Some("alice-id-token".into()),
                refresh_token: Some(REFRESH_TOKEN.into()),
                expires_in: Some(3600),
            })
        } else {
            anyhow::bail!("NotAuthorizedException: incorrect username or password")
        }
    }

    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<AuthTokens> {
        if refresh_token == REFRESH_TOKEN {
            Ok(AuthTokens {
                access_token: Some(ALICE_TOKEN.into()),
                id_token: Some("alice-id-token".into()),
                refresh_token: None,
                expires_in: Some(3600),
            })
        } else {
            anyhow::bail!("NotAuthorizedException: invalid refresh token")
        }
    }

    async fn global_sign_out(&self, access_token: &str) -> anyhow::Result<()> {
        self.sign_outs.lock().unwrap().push(access_token.to_string());
        Ok(())
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub metrics: Arc<FakeMetricRepository>,
    pub identity: Arc<FakeIdentityProvider>,
}

pub fn test_config(domain: Option<&str>) -> AppConfig {
    let domain = domain.map(str::to_string);
    AppConfig::from_vars(move |key| match key {
        "COGNITO_USER_POOL_ID" => Some("us-east-1_TestPool".into()),
        "COGNITO_CLIENT_ID" => Some("test-client".into()),
        "COGNITO_REDIRECT_URI" => Some("http://localhost:3000/auth/callback".into()),
        "COGNITO_DOMAIN" => domain.clone(),
        _ => None,
    })
    .expect("test config")
}

/// Router wired to in-memory fakes; no database or network needed.
pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config(Some("quantified-me")))
}

pub fn create_test_app_with(config: AppConfig) -> TestApp {
    let metrics = Arc::new(FakeMetricRepository::default());
    let identity = Arc::new(FakeIdentityProvider::new());
    let state = AppState::from_parts(
        Arc::new(config),
        metrics.clone(),
        Arc::new(FakeCatalog),
        identity.clone(),
    );
    TestApp {
        router: build_app(state),
        metrics,
        identity,
    }
}

/// Builds a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends a request through the router and parses the JSON body (Null when empty).
#[allow(dead_code)]
pub async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, headers, body)
}
