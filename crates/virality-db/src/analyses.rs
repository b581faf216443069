//! Database operations for `analyses`.
//!
//! Every read and write is scoped by `user_id`; an analysis owned by another
//! user is indistinguishable from a missing one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;
use virality_core::{
    Analysis, AnalysisPatch, AnalysisStatus, AnalysisWithInsights, NewAnalysis, PlatformInsight,
    TargetAudience,
};

use crate::insights::list_insights_for;
use crate::DbError;

const ANALYSIS_COLUMNS: &str = "id, user_id, title, content, content_type, platforms, \
     target_audience, status, overall_virality_score, created_at, updated_at";

/// A row from the `analyses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub content_type: String,
    pub platforms: Vec<String>,
    pub target_audience: Json<TargetAudience>,
    pub status: String,
    pub overall_virality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRow {
    /// Convert into the domain record, decoding the text-typed enum columns.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] if `status` or `content_type` hold values
    /// the schema's check constraints should have prevented.
    pub fn into_analysis(self) -> Result<Analysis, DbError> {
        let corrupt = |e: virality_core::CoreError| DbError::Corrupt {
            table: "analyses",
            reason: e.to_string(),
        };
        Ok(Analysis {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            content_type: self.content_type.parse().map_err(corrupt)?,
            platforms: self.platforms,
            target_audience: self.target_audience.0,
            status: self.status.parse().map_err(corrupt)?,
            overall_virality_score: self.overall_virality_score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Returns the caller's analyses joined with their insights, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails or [`DbError::Corrupt`] if a
/// row cannot be decoded.
pub async fn list_analyses(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<AnalysisWithInsights>, DbError> {
    let rows = sqlx::query_as::<_, AnalysisRow>(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM analyses \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut insights_by_analysis: HashMap<Uuid, Vec<PlatformInsight>> = HashMap::new();
    for insight in list_insights_for(pool, &ids).await? {
        insights_by_analysis
            .entry(insight.analysis_id)
            .or_default()
            .push(insight);
    }

    rows.into_iter()
        .map(|row| {
            let platform_insights = insights_by_analysis.remove(&row.id).unwrap_or_default();
            Ok(AnalysisWithInsights {
                analysis: row.into_analysis()?,
                platform_insights,
            })
        })
        .collect()
}

async fn fetch_owned_row(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<AnalysisRow, DbError> {
    sqlx::query_as::<_, AnalysisRow>(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches one analysis with its insights.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the analysis does not exist or belongs to
/// another user, or [`DbError::Sqlx`] if a query fails.
pub async fn get_analysis(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<AnalysisWithInsights, DbError> {
    let row = fetch_owned_row(pool, user_id, id).await?;
    let platform_insights = list_insights_for(pool, &[id]).await?;
    Ok(AnalysisWithInsights {
        analysis: row.into_analysis()?,
        platform_insights,
    })
}

/// Inserts a `pending` analysis and spends one credit, atomically.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no profile,
/// [`DbError::InsufficientCredits`] if no credits remain, or
/// [`DbError::Sqlx`] if a statement fails.
pub async fn create_analysis(
    pool: &PgPool,
    user_id: Uuid,
    new: &NewAnalysis,
) -> Result<Analysis, DbError> {
    let mut tx = pool.begin().await?;

    let remaining: Option<i32> = sqlx::query_scalar(
        "UPDATE profiles \
         SET credits_remaining = credits_remaining - 1, updated_at = NOW() \
         WHERE user_id = $1 AND credits_remaining > 0 \
         RETURNING credits_remaining",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if remaining.is_none() {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        return Err(if exists {
            DbError::InsufficientCredits
        } else {
            DbError::NotFound
        });
    }

    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "INSERT INTO analyses \
             (id, user_id, title, content, content_type, platforms, target_audience, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending') \
         RETURNING {ANALYSIS_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&new.title)
    .bind(&new.content)
    .bind(new.content_type.as_str())
    .bind(&new.platforms)
    .bind(Json(&new.target_audience))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        analysis_id = %row.id,
        %user_id,
        credits_remaining = remaining.unwrap_or_default(),
        "analysis created"
    );

    row.into_analysis()
}

/// Applies a status/score patch after checking it against the lifecycle.
///
/// The update is conditional on the status read beforehand, so a concurrent
/// writer that moved the analysis first causes
/// [`DbError::InvalidTransition`] rather than a backward step.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for unknown or foreign analyses,
/// [`DbError::Lifecycle`] when the patch breaks a lifecycle rule,
/// [`DbError::InvalidTransition`] on a lost race, or [`DbError::Sqlx`].
pub async fn update_analysis(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    patch: &AnalysisPatch,
) -> Result<Analysis, DbError> {
    let current = fetch_owned_row(pool, user_id, id).await?.into_analysis()?;
    let next: AnalysisStatus = patch.validate_against(current.status)?;

    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "UPDATE analyses \
         SET status = $1, overall_virality_score = $2, updated_at = NOW() \
         WHERE id = $3 AND user_id = $4 AND status = $5 \
         RETURNING {ANALYSIS_COLUMNS}"
    ))
    .bind(next.as_str())
    .bind(patch.overall_virality_score)
    .bind(id)
    .bind(user_id)
    .bind(current.status.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidTransition {
        id,
        expected_status: current.status.as_str(),
    })?;

    row.into_analysis()
}
