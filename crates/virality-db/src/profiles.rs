//! Database operations for `profiles` (credits and subscription tier).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use virality_core::Credits;

use crate::DbError;

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub credits_remaining: i32,
    pub subscription_tier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fetches a user's profile.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no profile, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<ProfileRow, DbError> {
    sqlx::query_as::<_, ProfileRow>(
        "SELECT user_id, credits_remaining, subscription_tier, created_at, updated_at \
         FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the caller's remaining credits and subscription tier.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no profile, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_credits(pool: &PgPool, user_id: Uuid) -> Result<Credits, DbError> {
    let row = get_profile(pool, user_id).await?;
    Ok(Credits {
        credits_remaining: row.credits_remaining,
        subscription_tier: row.subscription_tier,
    })
}

/// Returns the user's profile, creating it with the default credits and tier
/// on first use. An existing profile is left unchanged.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or the read fails.
pub async fn ensure_profile(pool: &PgPool, user_id: Uuid) -> Result<ProfileRow, DbError> {
    let inserted = sqlx::query(
        "INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(pool)
    .await?
    .rows_affected();
    if inserted > 0 {
        tracing::info!(%user_id, "profile provisioned");
    }
    get_profile(pool, user_id).await
}

/// Creates a profile or resets its credits and tier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including a negative
/// `credits` value rejected by the check constraint).
pub async fn upsert_profile(
    pool: &PgPool,
    user_id: Uuid,
    credits: i32,
    tier: &str,
) -> Result<ProfileRow, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "INSERT INTO profiles (user_id, credits_remaining, subscription_tier) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO UPDATE SET \
             credits_remaining = EXCLUDED.credits_remaining, \
             subscription_tier = EXCLUDED.subscription_tier, \
             updated_at        = NOW() \
         RETURNING user_id, credits_remaining, subscription_tier, created_at, updated_at",
    )
    .bind(user_id)
    .bind(credits)
    .bind(tier)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
