//! Statement assembly for the metric repository.
//!
//! Conditional clauses are appended with `push_bind` in the same step as
//! their SQL fragment, so a fragment can never exist without its parameter.
//! Values are never formatted into the SQL text.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;
use time::OffsetDateTime;

use super::validation::{MetricFilter, MetricPatch, StatsRange};

const METRIC_COLUMNS: &str =
    "id, user_id, metric_type_id, value, recorded_at, source, notes, created_at, updated_at";

const METRIC_WITH_TYPE_SELECT: &str = r#"
    SELECT
        hm.id, hm.user_id, hm.metric_type_id, hm.value, hm.recorded_at,
        hm.source, hm.notes, hm.created_at, hm.updated_at,
        mt.name AS metric_name,
        mt.display_name,
        mt.unit,
        mc.name AS category_name,
        mc.color AS category_color
    FROM health_metrics hm
    JOIN metric_types mt ON hm.metric_type_id = mt.id
    JOIN metric_categories mc ON mt.category_id = mc.id
"#;

/// Appends ` AND <column> <op> $n` with `value` bound as `$n`.
fn and_bind<'args, T>(qb: &mut QueryBuilder<'args, Postgres>, predicate: &str, value: T)
where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres> + Send,
{
    qb.push(" AND ").push(predicate).push(" ").push_bind(value);
}

/// Appends the optional time-window predicates on `column`.
fn push_range<'args>(
    qb: &mut QueryBuilder<'args, Postgres>,
    column: &str,
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
) {
    if let Some(start) = start {
        and_bind(qb, &format!("{column} >="), start);
    }
    if let Some(end) = end {
        and_bind(qb, &format!("{column} <="), end);
    }
}

/// Owner-scoped listing: type, start, end, source predicates in that order,
/// newest first, `LIMIT`/`OFFSET` as the last two parameters.
pub fn find_by_user<'args>(
    user_id: &'args str,
    filter: &'args MetricFilter,
) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(METRIC_WITH_TYPE_SELECT);
    qb.push(" WHERE hm.user_id = ").push_bind(user_id);

    if let Some(metric_type_id) = filter.metric_type_id {
        and_bind(&mut qb, "hm.metric_type_id =", metric_type_id);
    }
    push_range(&mut qb, "hm.recorded_at", filter.start_date, filter.end_date);
    if let Some(source) = filter.source.as_deref() {
        and_bind(&mut qb, "hm.source =", source);
    }

    qb.push(" ORDER BY hm.recorded_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
    qb
}

pub fn find_by_id<'args>(id: Uuid, user_id: &'args str) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(METRIC_WITH_TYPE_SELECT);
    qb.push(" WHERE hm.id = ")
        .push_bind(id)
        .push(" AND hm.user_id = ")
        .push_bind(user_id);
    qb
}

/// Owner-scoped partial update. Returns `None` for an empty patch so the
/// caller issues no statement at all.
pub fn update<'args>(
    id: Uuid,
    user_id: &'args str,
    patch: &'args MetricPatch,
) -> Option<QueryBuilder<'args, Postgres>> {
    if patch.is_empty() {
        return None;
    }

    let mut qb = QueryBuilder::new("UPDATE health_metrics SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(metric_type_id) = patch.metric_type_id {
            set.push("metric_type_id = ").push_bind_unseparated(metric_type_id);
        }
        if let Some(value) = patch.value {
            set.push("value = ").push_bind_unseparated(value);
        }
        if let Some(recorded_at) = patch.recorded_at {
            set.push("recorded_at = ").push_bind_unseparated(recorded_at);
        }
        if let Some(source) = patch.source.as_deref() {
            set.push("source = ").push_bind_unseparated(source);
        }
        if let Some(notes) = patch.notes.as_deref() {
            set.push("notes = ").push_bind_unseparated(notes);
        }
        set.push("updated_at = NOW()");
    }
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" AND user_id = ")
        .push_bind(user_id)
        .push(" RETURNING ")
        .push(METRIC_COLUMNS);
    Some(qb)
}

pub fn stats<'args>(
    user_id: &'args str,
    metric_type_id: i32,
    range: &StatsRange,
) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
    SELECT
        COUNT(*) AS count,
        AVG(value) AS average,
        MIN(value) AS min,
        MAX(value) AS max,
        STDDEV(value) AS std_dev
    FROM health_metrics
    WHERE user_id = "#,
    );
    qb.push_bind(user_id);
    and_bind(&mut qb, "metric_type_id =", metric_type_id);
    push_range(&mut qb, "recorded_at", range.start_date, range.end_date);
    qb
}
