use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /metrics`. Fields stay untyped until validation so that a
/// wrong type is reported against its field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetricBody {
    pub metric_type_id: Option<Value>,
    pub value: Option<Value>,
    pub recorded_at: Option<Value>,
    pub source: Option<Value>,
    pub notes: Option<Value>,
}

/// Body of `PUT /metrics/:id`; same fields as create, all optional.
pub type UpdateMetricBody = CreateMetricBody;

/// Query string of `GET /metrics`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQueryParams {
    pub metric_type_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub source: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Query string of `GET /metrics/stats/:metricTypeId`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}
