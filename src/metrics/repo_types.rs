use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One recorded observation, as stored in `health_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetric {
    pub id: Uuid,
    pub user_id: String,
    pub metric_type_id: i32,
    pub value: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub source: String,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A metric joined with its type and category display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MetricWithType {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub metric: HealthMetric,
    pub metric_name: String,
    pub display_name: String,
    pub unit: String,
    pub category_name: String,
    pub category_color: Option<String>,
}

/// Aggregates over a user's metrics of one type. The numeric fields are
/// `None` when nothing matched (and `std_dev` also for a single row).
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MetricStats {
    pub count: i64,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
}
