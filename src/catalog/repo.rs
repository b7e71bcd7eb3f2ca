use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{MetricCategory, MetricTypeWithCategory};

/// Read-only view of the seeded metric taxonomy.
#[async_trait]
pub trait MetricCatalog: Send + Sync {
    /// Ordered by category name, then type display name.
    async fn find_all(&self) -> anyhow::Result<Vec<MetricTypeWithCategory>>;

    /// Ordered by type display name.
    async fn find_by_category(&self, category: &str)
        -> anyhow::Result<Vec<MetricTypeWithCategory>>;

    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<MetricTypeWithCategory>>;

    async fn find_all_categories(&self) -> anyhow::Result<Vec<MetricCategory>>;
}

const TYPE_WITH_CATEGORY_SELECT: &str = r#"
    SELECT
        mt.id, mt.category_id, mt.name, mt.display_name, mt.description, mt.unit,
        mt.data_type, mt.min_value, mt.max_value, mt.default_value, mt.created_at,
        mc.name AS category_name,
        mc.icon AS category_icon,
        mc.color AS category_color
    FROM metric_types mt
    JOIN metric_categories mc ON mt.category_id = mc.id
"#;

#[derive(Clone)]
pub struct PgMetricCatalog {
    db: PgPool,
}

impl PgMetricCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetricCatalog for PgMetricCatalog {
    async fn find_all(&self) -> anyhow::Result<Vec<MetricTypeWithCategory>> {
        let sql = format!("{TYPE_WITH_CATEGORY_SELECT} ORDER BY mc.name, mt.display_name");
        let rows = sqlx::query_as::<_, MetricTypeWithCategory>(&sql)
            .fetch_all(&self.db)
            .await
            .context("list metric types")?;
        Ok(rows)
    }

    async fn find_by_category(
        &self,
        category: &str,
    ) -> anyhow::Result<Vec<MetricTypeWithCategory>> {
        let sql = format!("{TYPE_WITH_CATEGORY_SELECT} WHERE mc.name = $1 ORDER BY mt.display_name");
        let rows = sqlx::query_as::<_, MetricTypeWithCategory>(&sql)
            .bind(category)
            .fetch_all(&self.db)
            .await
            .context("list metric types by category")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<MetricTypeWithCategory>> {
        let sql = format!("{TYPE_WITH_CATEGORY_SELECT} WHERE mt.id = $1");
        let row = sqlx::query_as::<_, MetricTypeWithCategory>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("get metric type")?;
        Ok(row)
    }

    async fn find_all_categories(&self) -> anyhow::Result<Vec<MetricCategory>> {
        let rows = sqlx::query_as::<_, MetricCategory>(
            r#"
            SELECT id, name, description, icon, color, created_at
              FROM metric_categories
             ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list metric categories")?;
        Ok(rows)
    }
}
