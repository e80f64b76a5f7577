//! Queries over the `laps` table. Written by the heat engine only.

use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LapRow {
    pub heat_id: i64,
    pub pass_id: i64,
    pub transponder_id: i64,
    pub rtc_time: i64,
}

pub async fn insert(
    pool: &SqlitePool,
    heat_id: i64,
    pass_id: i64,
    transponder_id: i64,
    rtc_time: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO laps (heat_id, pass_id, transponder_id, rtc_time) VALUES (?, ?, ?, ?)")
        .bind(heat_id)
        .bind(pass_id)
        .bind(transponder_id)
        .bind(rtc_time)
        .execute(pool)
        .await?;
    Ok(())
}

/// The latest lap time of a transponder before a given pass, for the
/// minimum-lap check.
pub async fn previous_lap_time(
    pool: &SqlitePool,
    heat_id: i64,
    transponder_id: i64,
    before_pass_id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT rtc_time FROM laps \
         WHERE heat_id = ? AND transponder_id = ? AND pass_id < ? \
         ORDER BY pass_id DESC LIMIT 1",
    )
    .bind(heat_id)
    .bind(transponder_id)
    .bind(before_pass_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

/// The greatest pass id turned into a lap in this heat.
pub async fn last_pass_id(pool: &SqlitePool, heat_id: i64) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT pass_id FROM laps WHERE heat_id = ? ORDER BY pass_id DESC LIMIT 1")
            .bind(heat_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0))
}

pub async fn distinct_transponders(pool: &SqlitePool, heat_id: i64) -> Result<i64, sqlx::Error> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(DISTINCT transponder_id) FROM laps WHERE heat_id = ?")
            .bind(heat_id)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

/// Transponders with at least one lap after the nominal end of the heat.
pub async fn transponders_past(
    pool: &SqlitePool,
    heat_id: i64,
    rtc_time_end: i64,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT transponder_id) FROM laps WHERE heat_id = ? AND rtc_time > ?",
    )
    .bind(heat_id)
    .bind(rtc_time_end)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn all_for_heat(pool: &SqlitePool, heat_id: i64) -> Result<Vec<LapRow>, sqlx::Error> {
    sqlx::query_as::<_, LapRow>(
        "SELECT * FROM laps WHERE heat_id = ? ORDER BY pass_id ASC",
    )
    .bind(heat_id)
    .fetch_all(pool)
    .await
}
