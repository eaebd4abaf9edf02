//! Ledger database bootstrap.
//!
//! The schema is applied as one transaction and stamped with
//! `PRAGMA user_version`, so a store written by a newer build is refused
//! instead of being silently reinterpreted.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, Row};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Version stamped into `user_version` after the schema is applied.
pub const SCHEMA_VERSION: i64 = 2;

/// Open (creating if needed) the ledger database at `db_path` and bring its
/// schema up to [`SCHEMA_VERSION`].
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { relax_sync(conn).await }))
        .connect_with(options)
        .await?;

    let mut conn = pool.acquire().await?;
    migrate(&mut conn).await?;
    drop(conn);

    info!(path = db_path, version = SCHEMA_VERSION, "Ledger store ready");
    Ok(pool)
}

/// Schema version currently recorded in the database file.
pub async fn schema_version(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(&mut *conn).await?;
    Ok(row.get::<i64, _>(0))
}

async fn migrate(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let found = schema_version(conn).await?;
    if found > SCHEMA_VERSION {
        return Err(sqlx::Error::Configuration(
            format!(
                "ledger store has schema version {}, this build understands up to {}",
                found, SCHEMA_VERSION
            )
            .into(),
        ));
    }

    let mut tx = conn.begin().await?;
    for statement in include_str!("schema.sql").split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
    }
    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if found < SCHEMA_VERSION {
        info!(from = found, to = SCHEMA_VERSION, "Applied ledger schema");
    } else {
        debug!(version = found, "Ledger schema already current");
    }
    Ok(())
}

async fn relax_sync(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;
    Ok(())
}
