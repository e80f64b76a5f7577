//! Persistence layer: pool setup, migrations and the narrow query surface
//! over `passes`, `heats`, `laps` and `settings`. Every value reaches SQL
//! through parameter binding.

pub mod heats;
pub mod laps;
pub mod passes;
pub mod settings;

use crate::error::CoreResult;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::info;

/// Transient faults are retried this many times, one second apart.
pub const MAX_WRITE_ATTEMPTS: u32 = 30;
pub const WRITE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Idle connections are recycled after this long.
const IDLE_RECYCLE: Duration = Duration::from_secs(300);

pub async fn create_pool(db_path: &str) -> CoreResult<SqlitePool> {
    let url = format!("sqlite:{}?mode=rwc", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .idle_timeout(IDLE_RECYCLE)
        .connect(&url)
        .await?;

    info!(path = %db_path, "Database connected");
    Ok(pool)
}

/// A single-connection in-memory database, for tests and dry runs. One
/// connection only: each SQLite `:memory:` connection is its own database.
pub async fn create_memory_pool() -> CoreResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> CoreResult<()> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;

    let migrations = [include_str!("../../migrations/001_initial_schema.sql")];

    for migration_sql in &migrations {
        for statement in migration_sql.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(pool).await?;
            }
        }
    }

    info!("Database migrations applied");
    Ok(())
}

/// Faults worth retrying: the connection or pool went away mid-operation.
pub fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

/// Constraint violations: the write is wrong, not the connection. Logged
/// and swallowed by callers.
pub fn is_integrity(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => matches!(
            db.kind(),
            sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation
        ),
        _ => false,
    }
}
