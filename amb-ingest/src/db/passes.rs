//! Queries over the append-only `passes` table.

use super::{MAX_WRITE_ATTEMPTS, WRITE_RETRY_DELAY, is_integrity, is_transient};
use crate::error::{CoreError, CoreResult};
use amb_decoder::PassingRecord;
use sqlx::SqlitePool;
use tracing::warn;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PassRow {
    pub db_entry_id: i64,
    pub pass_id: i64,
    pub transponder_id: i64,
    pub rtc_time: i64,
    pub strength: i64,
    pub hits: i64,
    pub flags: i64,
    pub decoder_id: i64,
}

pub async fn insert(pool: &SqlitePool, record: &PassingRecord) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO passes (pass_id, transponder_id, rtc_time, strength, hits, flags, decoder_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.passing_number as i64)
    .bind(record.transponder as i64)
    .bind(record.rtc_time as i64)
    .bind(record.strength as i64)
    .bind(record.hits as i64)
    .bind(record.flags as i64)
    .bind(record.decoder_id.unwrap_or(0) as i64)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert with the bounded retry protocol: transient faults retried at a
/// fixed delay, integrity faults logged and swallowed (`Ok(None)`).
pub async fn insert_with_retry(
    pool: &SqlitePool,
    record: &PassingRecord,
) -> CoreResult<Option<i64>> {
    let mut attempts = 0;

    loop {
        match insert(pool, record).await {
            Ok(id) => return Ok(Some(id)),
            Err(error) if is_integrity(&error) => {
                warn!(
                    pass_id = record.passing_number,
                    error = %error,
                    "Dropping passing that violates an integrity constraint"
                );
                return Ok(None);
            }
            Err(error) if is_transient(&error) && attempts < MAX_WRITE_ATTEMPTS => {
                attempts += 1;
                warn!(
                    attempt = attempts,
                    error = %error,
                    "Transient database fault while inserting passing, retrying"
                );
                tokio::time::sleep(WRITE_RETRY_DELAY).await;
            }
            Err(error) => return Err(CoreError::Persistence(error)),
        }
    }
}

/// The first passing that can open a heat: later than every pass already
/// turned into a lap, and detected after the green flag went up.
pub async fn first_qualifying(
    pool: &SqlitePool,
    green_flag_time: i64,
) -> Result<Option<PassRow>, sqlx::Error> {
    sqlx::query_as::<_, PassRow>(
        "SELECT * FROM passes \
         WHERE pass_id > COALESCE((SELECT MAX(pass_id) FROM laps), 0) AND rtc_time > ? \
         ORDER BY pass_id ASC LIMIT 1",
    )
    .bind(green_flag_time)
    .fetch_optional(pool)
    .await
}

/// Unprocessed passings of the current heat: everything in the window
/// `[first_pass_id, rtc_time_max_end]` plus the single next passing beyond
/// the window, minus anything already turned into a lap.
pub async fn unprocessed_for_heat(
    pool: &SqlitePool,
    first_pass_id: i64,
    rtc_time_max_end: i64,
) -> Result<Vec<PassRow>, sqlx::Error> {
    sqlx::query_as::<_, PassRow>(
        "SELECT passes.* FROM ( \
             SELECT * FROM passes WHERE pass_id >= ? AND rtc_time <= ? \
             UNION ALL \
             SELECT * FROM ( \
                 SELECT * FROM passes WHERE rtc_time > ? ORDER BY rtc_time ASC, pass_id ASC LIMIT 1 \
             ) \
         ) AS passes \
         LEFT JOIN laps ON passes.pass_id = laps.pass_id \
         WHERE laps.heat_id IS NULL \
         ORDER BY passes.pass_id ASC",
    )
    .bind(first_pass_id)
    .bind(rtc_time_max_end)
    .bind(rtc_time_max_end)
    .fetch_all(pool)
    .await
}

/// Remove a passing disqualified by the minimum-lap check.
pub async fn delete(pool: &SqlitePool, pass_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM passes WHERE pass_id = ?")
        .bind(pass_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM passes")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
