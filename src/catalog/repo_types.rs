use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "metric_data_type", rename_all = "lowercase")]
pub enum MetricDataType {
    Integer,
    Decimal,
    Duration,
    Boolean,
}

/// A grouping of metric types, e.g. Activity or Sleep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MetricCategory {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MetricType {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub unit: String,
    pub data_type: MetricDataType,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub default_value: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A metric type with its category's display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MetricTypeWithCategory {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub metric_type: MetricType,
    pub category_name: String,
    pub category_icon: Option<String>,
    pub category_color: Option<String>,
}
