//! Queries over the `heats` table. Only the heat engine writes here.

use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HeatRow {
    pub heat_id: i64,
    pub heat_finished: i64,
    pub first_pass_id: i64,
    pub last_pass_id: Option<i64>,
    pub rtc_time_start: i64,
    pub rtc_time_end: i64,
    pub race_flag: i64,
    pub rtc_time_max_end: i64,
}

/// The running heat, if one exists. Resumes across restarts.
pub async fn unfinished(pool: &SqlitePool) -> Result<Option<HeatRow>, sqlx::Error> {
    sqlx::query_as::<_, HeatRow>(
        "SELECT * FROM heats WHERE heat_finished = 0 ORDER BY heat_id DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

pub async fn insert(
    pool: &SqlitePool,
    first_pass_id: i64,
    rtc_time_start: i64,
    rtc_time_end: i64,
    rtc_time_max_end: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO heats (first_pass_id, rtc_time_start, rtc_time_end, rtc_time_max_end) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(first_pass_id)
    .bind(rtc_time_start)
    .bind(rtc_time_end)
    .bind(rtc_time_max_end)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn race_flag(pool: &SqlitePool, heat_id: i64) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT race_flag FROM heats WHERE heat_id = ?")
        .bind(heat_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn wave_finish_flag(pool: &SqlitePool, heat_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE heats SET race_flag = 1 WHERE heat_id = ?")
        .bind(heat_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn finalize(
    pool: &SqlitePool,
    heat_id: i64,
    last_pass_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE heats SET heat_finished = 1, last_pass_id = ? WHERE heat_id = ?")
        .bind(last_pass_id)
        .bind(heat_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, heat_id: i64) -> Result<HeatRow, sqlx::Error> {
    sqlx::query_as::<_, HeatRow>("SELECT * FROM heats WHERE heat_id = ?")
        .bind(heat_id)
        .fetch_one(pool)
        .await
}
