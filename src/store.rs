//! # Matching-Result Store
//!
//! Postgres persistence for matching results, keyed by (user, receipt content
//! hash) so that re-opening the same receipt restores prior manual
//! corrections. Results and their changed-index sets are stored as JSONB and
//! round-trip through serde.
//!
//! Persistence is best-effort from the caller's perspective: a failed save is
//! logged and surfaced, but the in-memory working result already handed to
//! the UI layer stays authoritative for the current turn.

use crate::config::DatabaseConfig;
use crate::editing::ChangedIndices;
use crate::errors::error_logging;
use crate::matching::IngredientMatchingResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

/// Build a connection pool from validated database configuration.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// Initialize the matching-result schema.
pub async fn init_matching_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing matching-result schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS matching_results (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            receipt_hash VARCHAR(64) NOT NULL,
            result JSONB NOT NULL,
            changed_indices JSONB NOT NULL DEFAULT '[]',
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, receipt_hash)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create matching_results table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS matching_results_user_id_idx ON matching_results(user_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create matching_results user_id index")?;

    info!("Matching-result schema initialized successfully");
    Ok(())
}

/// Save (upsert) a matching result and its changed-index set.
///
/// Returns `true` when a row was written. Re-saving under the same key
/// replaces the stored result, which is how re-analysis discards stale
/// corrections.
pub async fn save_matching_result(
    pool: &PgPool,
    user_id: i64,
    receipt_hash: &str,
    result: &IngredientMatchingResult,
    changed_indices: &ChangedIndices,
) -> Result<bool> {
    debug!(user_id = %user_id, receipt_hash = %receipt_hash, "Saving matching result");

    let result_json =
        serde_json::to_string(result).context("Failed to serialize matching result")?;
    let changed_json =
        serde_json::to_string(changed_indices).context("Failed to serialize changed indices")?;

    let query_result = sqlx::query(
        "INSERT INTO matching_results (user_id, receipt_hash, result, changed_indices)
         VALUES ($1, $2, $3::jsonb, $4::jsonb)
         ON CONFLICT (user_id, receipt_hash)
         DO UPDATE SET result = EXCLUDED.result,
                       changed_indices = EXCLUDED.changed_indices,
                       updated_at = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(receipt_hash)
    .bind(&result_json)
    .bind(&changed_json)
    .execute(pool)
    .await;

    match query_result {
        Ok(outcome) => {
            debug!(user_id = %user_id, "Matching result saved successfully");
            Ok(outcome.rows_affected() > 0)
        }
        Err(e) => {
            error_logging::log_storage_error(
                &e,
                "save_matching_result",
                Some(user_id),
                Some(receipt_hash),
            );
            Err(e).context("Failed to save matching result")
        }
    }
}

/// Load a previously saved matching result and its changed-index set.
pub async fn load_matching_result(
    pool: &PgPool,
    user_id: i64,
    receipt_hash: &str,
) -> Result<Option<(IngredientMatchingResult, ChangedIndices)>> {
    debug!(user_id = %user_id, receipt_hash = %receipt_hash, "Loading matching result");

    let row = sqlx::query(
        "SELECT result::text, changed_indices::text FROM matching_results
         WHERE user_id = $1 AND receipt_hash = $2",
    )
    .bind(user_id)
    .bind(receipt_hash)
    .fetch_optional(pool)
    .await
    .context("Failed to load matching result")?;

    match row {
        Some(row) => {
            let result_json: String = row.get(0);
            let changed_json: String = row.get(1);

            let result: IngredientMatchingResult = serde_json::from_str(&result_json)
                .context("Failed to deserialize matching result")?;
            let changed_indices: ChangedIndices = serde_json::from_str(&changed_json)
                .context("Failed to deserialize changed indices")?;

            debug!(user_id = %user_id, "Matching result found");
            Ok(Some((result, changed_indices)))
        }
        None => {
            debug!(user_id = %user_id, "No matching result found");
            Ok(None)
        }
    }
}

/// When the stored result was last written, for "saved N minutes ago"
/// rendering in the correction UI.
pub async fn last_updated(
    pool: &PgPool,
    user_id: i64,
    receipt_hash: &str,
) -> Result<Option<DateTime<Utc>>> {
    let row = sqlx::query(
        "SELECT updated_at FROM matching_results WHERE user_id = $1 AND receipt_hash = $2",
    )
    .bind(user_id)
    .bind(receipt_hash)
    .fetch_optional(pool)
    .await
    .context("Failed to load matching result timestamp")?;

    Ok(row.map(|row| row.get(0)))
}

/// Delete a stored matching result, e.g. when a new photo replaces it.
pub async fn delete_matching_result(
    pool: &PgPool,
    user_id: i64,
    receipt_hash: &str,
) -> Result<bool> {
    debug!(user_id = %user_id, receipt_hash = %receipt_hash, "Deleting matching result");

    let result = sqlx::query(
        "DELETE FROM matching_results WHERE user_id = $1 AND receipt_hash = $2",
    )
    .bind(user_id)
    .bind(receipt_hash)
    .execute(pool)
    .await
    .context("Failed to delete matching result")?;

    let rows_affected = result.rows_affected();
    if rows_affected > 0 {
        debug!(user_id = %user_id, "Matching result deleted successfully");
        Ok(true)
    } else {
        info!("No matching result found for user_id: {user_id}");
        Ok(false)
    }
}
