//! Database operations for `platform_insights`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use virality_core::PlatformInsight;

use crate::DbError;

/// A row from the `platform_insights` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformInsightRow {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub platform: String,
    pub metrics: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<PlatformInsightRow> for PlatformInsight {
    fn from(row: PlatformInsightRow) -> Self {
        Self {
            id: row.id,
            analysis_id: row.analysis_id,
            platform: row.platform,
            metrics: row.metrics,
            created_at: row.created_at,
        }
    }
}

/// Returns the insights of the given analyses, ordered by platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_insights_for(
    pool: &PgPool,
    analysis_ids: &[Uuid],
) -> Result<Vec<PlatformInsight>, DbError> {
    if analysis_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, PlatformInsightRow>(
        "SELECT id, analysis_id, platform, metrics, created_at \
         FROM platform_insights \
         WHERE analysis_id = ANY($1) \
         ORDER BY analysis_id, platform",
    )
    .bind(analysis_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PlatformInsight::from).collect())
}

/// Records (or replaces) the metrics for one platform of an analysis.
///
/// Only platforms selected when the analysis was created are accepted.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the analysis does not exist,
/// [`DbError::PlatformNotSelected`] if `platform` is not one of its
/// platforms, or [`DbError::Sqlx`] if a statement fails.
pub async fn insert_platform_insight(
    pool: &PgPool,
    analysis_id: Uuid,
    platform: &str,
    metrics: &serde_json::Value,
) -> Result<PlatformInsight, DbError> {
    let row = sqlx::query_as::<_, PlatformInsightRow>(
        "INSERT INTO platform_insights (id, analysis_id, platform, metrics) \
         SELECT $1, a.id, $3, $4 FROM analyses a \
         WHERE a.id = $2 AND $3 = ANY(a.platforms) \
         ON CONFLICT (analysis_id, platform) DO UPDATE SET metrics = EXCLUDED.metrics \
         RETURNING id, analysis_id, platform, metrics, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(analysis_id)
    .bind(platform)
    .bind(metrics)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(row.into());
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM analyses WHERE id = $1)")
        .bind(analysis_id)
        .fetch_one(pool)
        .await?;

    Err(if exists {
        DbError::PlatformNotSelected {
            analysis_id,
            platform: platform.to_owned(),
        }
    } else {
        DbError::NotFound
    })
}
