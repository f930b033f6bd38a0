#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch scheduler and run orchestrator for the speed-limit enrichment
//! pipeline.
//!
//! One run drains the backlog of unprocessed positions: fetch a batch,
//! fan out one Overpass query per position under the concurrency ceiling,
//! resolve each response through the policy, commit the batch in one
//! idempotent bulk insert, sleep the pacing delay, repeat until a fetch
//! comes back empty.
//!
//! Per-position failures never abort a run. Positions the service cannot
//! resolve are remembered for the rest of the run (and excluded from later
//! fetches) so the loop terminates; they stay in the backlog for the next
//! run.

pub mod config;

use std::collections::{BTreeMap, BTreeSet};

use speed_map_database::queries;
use speed_map_models::{Position, SpeedLimitRecord};
use speed_map_overpass::{WayLookup, policy};
use switchy_database::Database;

pub use config::EnrichConfig;

/// Counters accumulated over one enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of batches executed.
    pub batches: u64,
    /// Positions pulled from the backlog and attempted.
    pub processed: u64,
    /// Speed-limit records actually inserted (conflicts count zero).
    pub inserted: u64,
    /// Positions attempted this run that produced no record.
    pub unresolved: u64,
    /// Diagnostic counter of resolved `(road_name, speed_limit)` pairs.
    ///
    /// A side diagnostic for spotting roads resolved many times over, not
    /// part of the persistence contract.
    pub road_stats: BTreeMap<(String, i32), u64>,
}

impl RunStats {
    /// Counts one resolved record against the road duplication diagnostic.
    pub fn record_road(&mut self, road_name: &str, speed_limit: i32) {
        *self
            .road_stats
            .entry((road_name.to_string(), speed_limit))
            .or_default() += 1;
    }

    /// Returns the road duplication stats sorted by count, descending.
    #[must_use]
    pub fn road_stats_sorted(&self) -> Vec<(&(String, i32), u64)> {
        let mut entries: Vec<_> = self
            .road_stats
            .iter()
            .map(|(key, &count)| (key, count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

/// Drains the backlog of unprocessed positions.
///
/// Terminates when a fetch returns no positions (everything is either
/// written or was attempted this run), or once `limit` positions have been
/// processed. Batch-level failures are logged and the affected positions
/// are left in the backlog for the next run; only database errors on the
/// fetch path propagate, since no progress is possible without the store.
///
/// # Errors
///
/// Returns an error if fetching unprocessed positions fails.
pub async fn run(
    db: &dyn Database,
    lookup: &dyn WayLookup,
    config: &EnrichConfig,
    limit: Option<u64>,
) -> Result<RunStats, Box<dyn std::error::Error>> {
    let mut stats = RunStats::default();
    let mut unresolved: BTreeSet<i64> = BTreeSet::new();

    loop {
        let batch_size = match limit {
            Some(cap) => {
                let remaining = cap.saturating_sub(stats.processed);
                if remaining == 0 {
                    log::info!("Reached --limit after {} positions", stats.processed);
                    break;
                }
                config.batch_size.min(remaining)
            }
            None => config.batch_size,
        };

        let exclude: Vec<i64> = unresolved.iter().copied().collect();
        let positions = queries::fetch_unprocessed(db, batch_size, &exclude).await?;
        log::info!("Found {} positions to process", positions.len());
        if positions.is_empty() {
            break;
        }

        let records = process_batch(lookup, &positions, config.concurrency).await;
        let resolved_ids: BTreeSet<i64> = records.iter().map(|r| r.position_id).collect();

        match queries::insert_speed_limits(db, &records).await {
            Ok(inserted) => {
                log::info!("Batch inserted {inserted} speed limits");
                stats.inserted += inserted;
                for record in &records {
                    stats.record_road(&record.road_name, record.speed_limit);
                }
                for position in &positions {
                    if !resolved_ids.contains(&position.id) {
                        unresolved.insert(position.id);
                    }
                }
            }
            Err(e) => {
                // The transaction rolled back; the whole batch stays in the
                // backlog and is retried on the next full run.
                log::error!("Batch insert failed: {e}");
                for position in &positions {
                    unresolved.insert(position.id);
                }
            }
        }

        stats.batches += 1;
        #[allow(clippy::cast_possible_truncation)]
        let batch_len = positions.len() as u64;
        stats.processed += batch_len;
        log::info!("Total processed: {}", stats.processed);

        tokio::time::sleep(config.batch_delay).await;
    }

    #[allow(clippy::cast_possible_truncation)]
    let unresolved_len = unresolved.len() as u64;
    stats.unresolved = unresolved_len;
    if unresolved_len > 0 {
        log::warn!(
            "{unresolved_len} positions could not be resolved this run; they stay in the backlog"
        );
    }

    Ok(stats)
}

/// Queries the geodata service for every position in the batch, bounded by
/// `concurrency`, and resolves the responses into speed-limit records.
///
/// Failures and positions without a nearby road are logged and dropped;
/// sibling queries are unaffected. Result order is unspecified.
pub async fn process_batch(
    lookup: &dyn WayLookup,
    positions: &[Position],
    concurrency: usize,
) -> Vec<SpeedLimitRecord> {
    use futures::stream::{self, StreamExt as _};

    let results: Vec<Option<SpeedLimitRecord>> =
        stream::iter(positions.iter().map(|position| async move {
            match lookup.nearest_way(position.latitude, position.longitude).await {
                Ok(Some(way)) => {
                    let resolved = policy::resolve(&way.tags);
                    let road_name = policy::road_name(&way.tags);
                    log::debug!(
                        "Position {}: way {} resolved to {} km/h (inferred={})",
                        position.id,
                        way.id,
                        resolved.speed_limit,
                        resolved.inferred
                    );
                    Some(SpeedLimitRecord {
                        position_id: position.id,
                        way_id: way.id,
                        speed_limit: resolved.speed_limit,
                        road_name,
                        inferred: resolved.inferred,
                    })
                }
                Ok(None) => {
                    log::debug!("Position {}: no road within query radius", position.id);
                    None
                }
                Err(e) => {
                    log::warn!("Position {}: Overpass lookup failed: {e}", position.id);
                    None
                }
            }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    results.into_iter().flatten().collect()
}
