use std::time::Duration;

use common_types::StationStatusRecord;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;

// Idempotent: only ever creates, never drops or alters an existing table.
const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS station_status (
    station_code TEXT NOT NULL,
    station_name TEXT NULL,
    commune TEXT NULL,

    capacity INT NULL,
    docks_available INT NULL,

    bikes_available INT NULL,
    bikes_mechanical INT NULL,
    bikes_ebike INT NULL,

    is_installed BOOLEAN NULL,
    is_returning BOOLEAN NULL,

    due_date TIMESTAMP NOT NULL,
    code_insee TEXT NOT NULL,
    geo TEXT NOT NULL,

    PRIMARY KEY (station_code, due_date)
)
"#;

// Last write wins the whole row: every non-key column is overwritten with the
// newly received values, nulls included. Merging nulls would resurrect stale
// readings on redelivery.
const UPSERT_STATUS: &str = r#"
INSERT INTO station_status (
    station_code, station_name, commune,
    capacity, docks_available,
    bikes_available, bikes_mechanical, bikes_ebike,
    is_installed, is_returning,
    due_date, code_insee, geo
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
ON CONFLICT (station_code, due_date) DO UPDATE SET
    station_name = EXCLUDED.station_name,
    commune = EXCLUDED.commune,
    capacity = EXCLUDED.capacity,
    docks_available = EXCLUDED.docks_available,
    bikes_available = EXCLUDED.bikes_available,
    bikes_mechanical = EXCLUDED.bikes_mechanical,
    bikes_ebike = EXCLUDED.bikes_ebike,
    is_installed = EXCLUDED.is_installed,
    is_returning = EXCLUDED.is_returning,
    code_insee = EXCLUDED.code_insee,
    geo = EXCLUDED.geo
"#;

/// Open a pool against the configured store, retrying failed attempts on a
/// fixed delay. Returns the last error once the attempt budget is exhausted;
/// callers treat that as fatal.
pub async fn connect_with_retry(config: &Config) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .database(&config.db_name)
        .username(&config.db_user)
        .password(&config.db_password);

    let mut last_error = None;
    for attempt in 1..=config.db_connect_attempts {
        match PgPoolOptions::new()
            .max_connections(config.max_pg_connections)
            .connect_with(options.clone())
            .await
        {
            Ok(pool) => {
                info!(attempt, "connected to the store");
                return Ok(pool);
            }
            Err(error) => {
                warn!(
                    attempt,
                    attempts = config.db_connect_attempts,
                    error = %error,
                    "store connection failed"
                );
                last_error = Some(error);
            }
        }
        if attempt < config.db_connect_attempts {
            tokio::time::sleep(Duration::from_secs(config.db_connect_retry_secs)).await;
        }
    }

    Err(last_error.unwrap_or(sqlx::Error::PoolClosed))
}

/// Create the destination table when absent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_TABLE).execute(pool).await?;
    Ok(())
}

/// Persist one observation. Re-applying a redelivered record is a no-op
/// state transition on the `(station_code, due_date)` key.
pub async fn upsert_status(
    pool: &PgPool,
    record: &StationStatusRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_STATUS)
        .bind(&record.station_code)
        .bind(&record.station_name)
        .bind(&record.commune)
        .bind(record.capacity)
        .bind(record.docks_available)
        .bind(record.bikes_available)
        .bind(record.bikes_mechanical)
        .bind(record.bikes_ebike)
        .bind(record.is_installed)
        .bind(record.is_returning)
        .bind(record.due_date)
        .bind(&record.code_insee)
        .bind(&record.geo)
        .execute(pool)
        .await?;
    Ok(())
}
