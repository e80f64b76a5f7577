//! The key/value `settings` table: race parameters read through at heat
//! creation.

use sqlx::SqlitePool;
use tracing::debug;

pub const DEFAULT_HEAT_DURATION: u64 = 590;
pub const DEFAULT_HEAT_COOLDOWN: u64 = 90;
pub const DEFAULT_MINIMUM_LAP_TIME: u64 = 10;

/// Heat parameters, in seconds. Missing or non-numeric rows fall back to
/// the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatSettings {
    pub green_flag: bool,
    pub heat_duration: u64,
    pub heat_cooldown: u64,
    pub minimum_lap_time: u64,
}

impl Default for HeatSettings {
    fn default() -> Self {
        Self {
            green_flag: false,
            heat_duration: DEFAULT_HEAT_DURATION,
            heat_cooldown: DEFAULT_HEAT_COOLDOWN,
            minimum_lap_time: DEFAULT_MINIMUM_LAP_TIME,
        }
    }
}

pub async fn load(pool: &SqlitePool) -> Result<HeatSettings, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT setting, value FROM settings")
        .fetch_all(pool)
        .await?;

    let mut settings = HeatSettings::default();
    for (setting, value) in rows {
        debug!(setting = %setting, value = %value, "Loaded setting");
        match setting.as_str() {
            "green_flag" => {
                if let Ok(flag) = value.parse::<i64>() {
                    settings.green_flag = flag != 0;
                }
            }
            "heat_duration" => {
                if let Ok(secs) = value.parse() {
                    settings.heat_duration = secs;
                }
            }
            "heat_cooldown" => {
                if let Ok(secs) = value.parse() {
                    settings.heat_cooldown = secs;
                }
            }
            "minimum_lap_time" => {
                if let Ok(secs) = value.parse() {
                    settings.minimum_lap_time = secs;
                }
            }
            _ => {}
        }
    }

    Ok(settings)
}

pub async fn green_flag(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE setting = 'green_flag'")
            .fetch_optional(pool)
            .await?;

    Ok(row
        .and_then(|(value,)| value.parse::<i64>().ok())
        .map(|flag| flag != 0)
        .unwrap_or(false))
}

pub async fn set(pool: &SqlitePool, setting: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO settings (setting, value) VALUES (?, ?)")
        .bind(setting)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}
