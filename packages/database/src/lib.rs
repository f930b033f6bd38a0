#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database connection, schema bootstrap, and queries for speed-map.
//!
//! The `positions` table belongs to the external telemetry store and is
//! only read. This crate owns the derived `speed_limits` table: one row per
//! position at most, written once, never updated. All SQL goes through
//! `switchy_database` raw queries so the same code runs against Postgres in
//! production and `SQLite` in the test suite.

pub mod db;
pub mod queries;

use switchy_database::Database;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Creates the `speed_limits` table and its way-id index if absent.
///
/// Idempotent; rerun harmlessly at every startup. The referenced
/// `positions` table is expected to exist already.
///
/// # Errors
///
/// Returns [`DbError`] if schema creation fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS speed_limits (
            position_id BIGINT PRIMARY KEY REFERENCES positions(id) ON DELETE CASCADE,
            way_id BIGINT,
            speed_limit INTEGER,
            road_name TEXT,
            inferred BOOLEAN DEFAULT FALSE,
            last_updated TIMESTAMP NOT NULL
        )",
    )
    .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_speed_limits_way_id ON speed_limits(way_id)")
        .await?;

    log::debug!("speed_limits schema ensured");
    Ok(())
}
