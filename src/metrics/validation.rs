//! Input schemas for the metric endpoints.
//!
//! Every raw body or query string goes through one of the `validate_*`
//! functions before the repository is touched. They collect all field
//! problems at once and return typed inputs on success.

use serde_json::Value;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

use super::dto::{CreateMetricBody, MetricQueryParams, StatsQueryParams, UpdateMetricBody};
use crate::error::{AppError, FieldErrors};

pub const DEFAULT_SOURCE: &str = "manual";
pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct NewMetric {
    pub metric_type_id: i32,
    pub value: f64,
    pub recorded_at: OffsetDateTime,
    pub source: String,
    pub notes: Option<String>,
}

/// Fields to change on an existing metric. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricPatch {
    pub metric_type_id: Option<i32>,
    pub value: Option<f64>,
    pub recorded_at: Option<OffsetDateTime>,
    pub source: Option<String>,
    pub notes: Option<String>,
}

impl MetricPatch {
    pub fn is_empty(&self) -> bool {
        self.metric_type_id.is_none()
            && self.value.is_none()
            && self.recorded_at.is_none()
            && self.source.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFilter {
    pub metric_type_id: Option<i32>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub source: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for MetricFilter {
    fn default() -> Self {
        Self {
            metric_type_id: None,
            start_date: None,
            end_date: None,
            source: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsRange {
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

pub fn validate_create(body: CreateMetricBody) -> Result<NewMetric, AppError> {
    let mut errors = FieldErrors::new();

    let metric_type_id = required(&mut errors, "metricTypeId", body.metric_type_id)
        .and_then(|v| json_metric_type_id(&mut errors, "metricTypeId", &v));
    let value =
        required(&mut errors, "value", body.value).and_then(|v| json_number(&mut errors, "value", &v));
    let recorded_at = required(&mut errors, "recordedAt", body.recorded_at)
        .and_then(|v| json_timestamp(&mut errors, "recordedAt", &v));
    let source = present(body.source).and_then(|v| json_string(&mut errors, "source", &v));
    let notes = present(body.notes).and_then(|v| json_string(&mut errors, "notes", &v));

    match (metric_type_id, value, recorded_at) {
        (Some(metric_type_id), Some(value), Some(recorded_at)) if errors.is_empty() => {
            Ok(NewMetric {
                metric_type_id,
                value,
                recorded_at,
                source: source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                notes,
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

pub fn validate_update(body: UpdateMetricBody) -> Result<MetricPatch, AppError> {
    let mut errors = FieldErrors::new();

    let patch = MetricPatch {
        metric_type_id: present(body.metric_type_id)
            .and_then(|v| json_metric_type_id(&mut errors, "metricTypeId", &v)),
        value: present(body.value).and_then(|v| json_number(&mut errors, "value", &v)),
        recorded_at: present(body.recorded_at)
            .and_then(|v| json_timestamp(&mut errors, "recordedAt", &v)),
        source: present(body.source).and_then(|v| json_string(&mut errors, "source", &v)),
        notes: present(body.notes).and_then(|v| json_string(&mut errors, "notes", &v)),
    };

    errors.into_result(patch)
}

pub fn validate_query(params: MetricQueryParams) -> Result<MetricFilter, AppError> {
    let mut errors = FieldErrors::new();

    let metric_type_id = non_empty(params.metric_type_id)
        .and_then(|s| text_metric_type_id(&mut errors, "metricTypeId", &s));
    let start_date =
        non_empty(params.start_date).and_then(|s| text_timestamp(&mut errors, "startDate", &s));
    let end_date =
        non_empty(params.end_date).and_then(|s| text_timestamp(&mut errors, "endDate", &s));

    let limit = match non_empty(params.limit) {
        None => DEFAULT_LIMIT,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if (1..=MAX_LIMIT).contains(&n) => n,
            Ok(_) => {
                errors.add("limit", format!("Must be between 1 and {MAX_LIMIT}"));
                DEFAULT_LIMIT
            }
            Err(_) => {
                errors.add("limit", "Expected integer");
                DEFAULT_LIMIT
            }
        },
    };

    let offset = match non_empty(params.offset) {
        None => 0,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if n >= 0 => n,
            Ok(_) => {
                errors.add("offset", "Must be greater than or equal to 0");
                0
            }
            Err(_) => {
                errors.add("offset", "Expected integer");
                0
            }
        },
    };

    errors.into_result(MetricFilter {
        metric_type_id,
        start_date,
        end_date,
        source: non_empty(params.source),
        limit,
        offset,
    })
}

pub fn validate_stats(
    raw_metric_type_id: &str,
    params: StatsQueryParams,
) -> Result<(i32, StatsRange), AppError> {
    let mut errors = FieldErrors::new();

    let metric_type_id = text_metric_type_id(&mut errors, "metricTypeId", raw_metric_type_id);
    let range = StatsRange {
        start_date: non_empty(params.start_date)
            .and_then(|s| text_timestamp(&mut errors, "startDate", &s)),
        end_date: non_empty(params.end_date)
            .and_then(|s| text_timestamp(&mut errors, "endDate", &s)),
    };

    match metric_type_id {
        Some(id) if errors.is_empty() => Ok((id, range)),
        _ => Err(AppError::Validation(errors)),
    }
}

/// Accepts an RFC 3339 datetime or a bare `YYYY-MM-DD` date (midnight UTC).
/// Sub-microsecond digits are dropped to match `timestamptz` precision.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        let nanos = ts.nanosecond();
        return ts.replace_nanosecond(nanos - nanos % 1_000).ok();
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<Value>) -> Option<Value> {
    let value = present(value);
    if value.is_none() {
        errors.add(field, "Required");
    }
    value
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn json_number(errors: &mut FieldErrors, field: &str, value: &Value) -> Option<f64> {
    match value.as_f64() {
        Some(n) if n.is_finite() => Some(n),
        Some(_) => {
            errors.add(field, "Expected finite number");
            None
        }
        None => {
            errors.add(
                field,
                format!("Expected number, received {}", type_name(value)),
            );
            None
        }
    }
}

fn json_metric_type_id(errors: &mut FieldErrors, field: &str, value: &Value) -> Option<i32> {
    let n = json_number(errors, field, value)?;
    if n.fract() != 0.0 {
        errors.add(field, "Expected integer, received float");
        return None;
    }
    check_metric_type_id(errors, field, n as i64)
}

fn text_metric_type_id(errors: &mut FieldErrors, field: &str, raw: &str) -> Option<i32> {
    match raw.trim().parse::<i64>() {
        Ok(n) => check_metric_type_id(errors, field, n),
        Err(_) => {
            errors.add(field, "Expected integer");
            None
        }
    }
}

fn check_metric_type_id(errors: &mut FieldErrors, field: &str, n: i64) -> Option<i32> {
    match i32::try_from(n) {
        Ok(id) if id >= 1 => Some(id),
        Ok(_) => {
            errors.add(field, "Number must be greater than 0");
            None
        }
        Err(_) => {
            errors.add(field, "Number is out of range");
            None
        }
    }
}

fn json_string(errors: &mut FieldErrors, field: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        other => {
            errors.add(
                field,
                format!("Expected string, received {}", type_name(other)),
            );
            None
        }
    }
}

fn json_timestamp(errors: &mut FieldErrors, field: &str, value: &Value) -> Option<OffsetDateTime> {
    let raw = json_string(errors, field, value)?;
    text_timestamp(errors, field, &raw)
}

fn text_timestamp(errors: &mut FieldErrors, field: &str, raw: &str) -> Option<OffsetDateTime> {
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        errors.add(field, "Invalid datetime");
    }
    parsed
}
