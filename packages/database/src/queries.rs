//! Database query functions for the speed-limit enrichment pipeline.
//!
//! Selection and insertion are the two halves of the pipeline's progress
//! contract: a position is "unprocessed" exactly as long as it has no
//! `speed_limits` row, and insertion is `ON CONFLICT DO NOTHING`, so the
//! whole pipeline can be rerun from scratch at any time.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use speed_map_models::{Position, SpeedLimitRecord};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Minimum recorded speed (km/h) for a position to be worth enriching.
///
/// Parked and crawling positions are skipped; they dominate telemetry
/// volume and rarely sit on a road the vehicle was actually driving.
pub const MIN_SPEED_KMH: i32 = 20;

/// Selects up to `limit` positions that have no speed-limit record yet.
///
/// Positions without a recorded speed, or at or below [`MIN_SPEED_KMH`],
/// are never selected. `exclude` removes positions already attempted in
/// this run so the backlog loop terminates even when the upstream cannot
/// resolve some of them. No ordering is guaranteed.
///
/// # Errors
///
/// Returns [`DbError`] if the query or row decoding fails.
pub async fn fetch_unprocessed(
    db: &dyn Database,
    limit: u64,
    exclude: &[i64],
) -> Result<Vec<Position>, DbError> {
    let mut sql = String::from(
        "SELECT p.id, p.latitude, p.longitude, p.speed
         FROM positions p
         LEFT JOIN speed_limits sl ON sl.position_id = p.id
         WHERE sl.position_id IS NULL
           AND p.speed IS NOT NULL
           AND p.speed > $1",
    );

    let mut params = vec![DatabaseValue::Int32(MIN_SPEED_KMH)];
    let mut param_idx = 2u32;

    if !exclude.is_empty() {
        sql.push_str(" AND p.id NOT IN (");
        for (i, id) in exclude.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            write!(sql, "${param_idx}").unwrap();
            params.push(DatabaseValue::Int64(*id));
            param_idx += 1;
        }
        sql.push(')');
    }

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(
        i64::try_from(limit).unwrap_or(i64::MAX),
    ));

    let rows = db.query_raw_params(&sql, &params).await?;

    let mut positions = Vec::with_capacity(rows.len());
    for row in &rows {
        positions.push(Position {
            id: row.to_value("id").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse position id: {e}"),
            })?,
            latitude: row.to_value("latitude").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse latitude: {e}"),
            })?,
            longitude: row.to_value("longitude").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse longitude: {e}"),
            })?,
            speed: row.to_value("speed").unwrap_or(None),
        });
    }

    Ok(positions)
}

/// Inserts a batch of resolved speed limits in one transaction.
///
/// Conflicting position ids are silently skipped, so replaying a batch (or
/// the whole pipeline) never duplicates or overwrites rows. Returns the
/// number of rows actually inserted; conflicts count zero.
///
/// # Errors
///
/// Returns [`DbError`] if the transaction fails; nothing from this batch is
/// committed in that case.
pub async fn insert_speed_limits(
    db: &dyn Database,
    records: &[SpeedLimitRecord],
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let now = chrono::Utc::now().naive_utc();
    let txn = db.begin_transaction().await?;
    let mut inserted = 0u64;

    for record in records {
        let result = txn
            .as_ref()
            .exec_raw_params(
                "INSERT INTO speed_limits (
                    position_id, way_id, speed_limit, road_name, inferred, last_updated
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (position_id) DO NOTHING",
                &[
                    DatabaseValue::Int64(record.position_id),
                    DatabaseValue::Int64(record.way_id),
                    DatabaseValue::Int32(record.speed_limit),
                    DatabaseValue::String(record.road_name.clone()),
                    DatabaseValue::Bool(record.inferred),
                    DatabaseValue::DateTime(now),
                ],
            )
            .await?;

        inserted += result;
    }

    txn.commit().await?;

    Ok(inserted)
}

/// Returns the number of positions still lacking a speed-limit record.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn count_unprocessed(db: &dyn Database) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) as cnt
             FROM positions p
             LEFT JOIN speed_limits sl ON sl.position_id = p.id
             WHERE sl.position_id IS NULL
               AND p.speed IS NOT NULL
               AND p.speed > $1",
            &[DatabaseValue::Int32(MIN_SPEED_KMH)],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(0);
    };

    Ok(row.to_value("cnt").unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::ensure_schema;

    static DB_COUNTER: AtomicU32 = AtomicU32::new(0);

    /// Opens a fresh `SQLite` database with the positions table and the
    /// speed-limits schema.
    async fn test_db() -> Box<dyn Database> {
        let path = std::env::temp_dir().join(format!(
            "speed_map_queries_{}_{}.db",
            std::process::id(),
            DB_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_file(&path);

        let db = switchy_database_connection::init_sqlite_rusqlite(Some(&path))
            .expect("Failed to open test database");

        db.exec_raw(
            "CREATE TABLE positions (
                id BIGINT PRIMARY KEY,
                latitude DOUBLE NOT NULL,
                longitude DOUBLE NOT NULL,
                speed INTEGER
            )",
        )
        .await
        .unwrap();

        ensure_schema(db.as_ref()).await.unwrap();
        db
    }

    async fn insert_position(db: &dyn Database, id: i64, speed: Option<i32>) {
        db.exec_raw_params(
            "INSERT INTO positions (id, latitude, longitude, speed) VALUES ($1, $2, $3, $4)",
            &[
                DatabaseValue::Int64(id),
                DatabaseValue::Real64(52.5),
                DatabaseValue::Real64(13.4),
                speed.map_or(DatabaseValue::Null, DatabaseValue::Int32),
            ],
        )
        .await
        .unwrap();
    }

    fn record(position_id: i64) -> SpeedLimitRecord {
        SpeedLimitRecord {
            position_id,
            way_id: 100 + position_id,
            speed_limit: 50,
            road_name: "Hauptstrasse".to_string(),
            inferred: true,
        }
    }

    #[tokio::test]
    async fn fetch_skips_slow_null_speed_and_processed_positions() {
        let db = test_db().await;
        insert_position(db.as_ref(), 1, Some(35)).await;
        insert_position(db.as_ref(), 2, Some(15)).await;
        insert_position(db.as_ref(), 3, None).await;
        insert_position(db.as_ref(), 4, Some(90)).await;

        insert_speed_limits(db.as_ref(), &[record(4)]).await.unwrap();

        let positions = fetch_unprocessed(db.as_ref(), 10, &[]).await.unwrap();
        let ids: Vec<i64> = positions.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(positions[0].speed, Some(35));
    }

    #[tokio::test]
    async fn fetch_honors_limit_and_exclusions() {
        let db = test_db().await;
        for id in 1..=5 {
            insert_position(db.as_ref(), id, Some(50)).await;
        }

        let limited = fetch_unprocessed(db.as_ref(), 2, &[]).await.unwrap();
        assert_eq!(limited.len(), 2);

        let excluded = fetch_unprocessed(db.as_ref(), 10, &[1, 2, 3]).await.unwrap();
        let mut ids: Vec<i64> = excluded.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![4, 5]);
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let db = test_db().await;
        insert_position(db.as_ref(), 1, Some(40)).await;
        insert_position(db.as_ref(), 2, Some(40)).await;

        let records = vec![record(1), record(2)];

        let first = insert_speed_limits(db.as_ref(), &records).await.unwrap();
        assert_eq!(first, 2);

        let second = insert_speed_limits(db.as_ref(), &records).await.unwrap();
        assert_eq!(second, 0);

        let rows = db
            .query_raw_params("SELECT COUNT(*) as cnt FROM speed_limits", &[])
            .await
            .unwrap();
        let count: i64 = rows.first().unwrap().to_value("cnt").unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn count_matches_backlog() {
        let db = test_db().await;
        insert_position(db.as_ref(), 1, Some(40)).await;
        insert_position(db.as_ref(), 2, Some(40)).await;
        insert_position(db.as_ref(), 3, Some(5)).await;

        assert_eq!(count_unprocessed(db.as_ref()).await.unwrap(), 2);

        insert_speed_limits(db.as_ref(), &[record(1)]).await.unwrap();
        assert_eq!(count_unprocessed(db.as_ref()).await.unwrap(), 1);

        let empty = insert_speed_limits(db.as_ref(), &[]).await.unwrap();
        assert_eq!(empty, 0);
    }
}
