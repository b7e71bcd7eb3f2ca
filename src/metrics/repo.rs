use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::query;
use super::repo_types::{HealthMetric, MetricStats, MetricWithType};
use super::validation::{MetricFilter, MetricPatch, NewMetric, StatsRange};

/// Storage for health metrics. Every read and write is scoped by the owning
/// user in the statement itself.
#[async_trait]
pub trait MetricRepository: Send + Sync {
    async fn create(&self, user_id: &str, input: NewMetric) -> anyhow::Result<HealthMetric>;

    /// Newest first. An empty result is not an error.
    async fn find_by_user(
        &self,
        user_id: &str,
        filter: &MetricFilter,
    ) -> anyhow::Result<Vec<MetricWithType>>;

    async fn find_by_id(&self, id: Uuid, user_id: &str) -> anyhow::Result<Option<MetricWithType>>;

    /// `None` when the patch is empty or no owned row matched.
    async fn update(
        &self,
        id: Uuid,
        user_id: &str,
        patch: MetricPatch,
    ) -> anyhow::Result<Option<HealthMetric>>;

    async fn delete(&self, id: Uuid, user_id: &str) -> anyhow::Result<bool>;

    async fn get_stats(
        &self,
        user_id: &str,
        metric_type_id: i32,
        range: &StatsRange,
    ) -> anyhow::Result<MetricStats>;
}

#[derive(Clone)]
pub struct PgMetricRepository {
    db: PgPool,
}

impl PgMetricRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetricRepository for PgMetricRepository {
    async fn create(&self, user_id: &str, input: NewMetric) -> anyhow::Result<HealthMetric> {
        let metric = sqlx::query_as::<_, HealthMetric>(
            r#"
            INSERT INTO health_metrics (id, user_id, metric_type_id, value, recorded_at, source, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, metric_type_id, value, recorded_at, source, notes,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(input.metric_type_id)
        .bind(input.value)
        .bind(input.recorded_at)
        .bind(&input.source)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await
        .context("insert health metric")?;
        Ok(metric)
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        filter: &MetricFilter,
    ) -> anyhow::Result<Vec<MetricWithType>> {
        let mut qb = query::find_by_user(user_id, filter);
        let rows = qb
            .build_query_as::<MetricWithType>()
            .fetch_all(&self.db)
            .await
            .context("list health metrics")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid, user_id: &str) -> anyhow::Result<Option<MetricWithType>> {
        let mut qb = query::find_by_id(id, user_id);
        let row = qb
            .build_query_as::<MetricWithType>()
            .fetch_optional(&self.db)
            .await
            .context("get health metric")?;
        Ok(row)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: &str,
        patch: MetricPatch,
    ) -> anyhow::Result<Option<HealthMetric>> {
        let Some(mut qb) = query::update(id, user_id, &patch) else {
            return Ok(None);
        };
        let row = qb
            .build_query_as::<HealthMetric>()
            .fetch_optional(&self.db)
            .await
            .context("update health metric")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"DELETE FROM health_metrics WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete health metric")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_stats(
        &self,
        user_id: &str,
        metric_type_id: i32,
        range: &StatsRange,
    ) -> anyhow::Result<MetricStats> {
        let mut qb = query::stats(user_id, metric_type_id, range);
        let stats = qb
            .build_query_as::<MetricStats>()
            .fetch_one(&self.db)
            .await
            .context("aggregate health metrics")?;
        Ok(stats)
    }
}
