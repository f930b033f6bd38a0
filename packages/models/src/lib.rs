#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared data types for the speed-map enrichment pipeline.
//!
//! These are the shapes exchanged between the Overpass client, the batch
//! scheduler, and the persistence layer. The `positions` table itself is
//! owned by the external telemetry store; [`Position`] is a read-only
//! projection of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A vehicle position record, as read from the external `positions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Primary key in the positions table.
    pub id: i64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Recorded vehicle speed in km/h, if the telemetry included one.
    pub speed: Option<i32>,
}

/// A resolved speed limit, ready to be written to the `speed_limits` table.
///
/// Only fully resolved results are ever built — a position whose Overpass
/// lookup returned no way produces no record at all, so `way_id` and
/// `speed_limit` are non-optional here even though the table columns are
/// nullable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedLimitRecord {
    /// Position this record belongs to (one record per position at most).
    pub position_id: i64,
    /// OSM way id of the matched road segment.
    pub way_id: i64,
    /// Speed limit in km/h.
    pub speed_limit: i32,
    /// Road name from the `name` or `ref` tag, `"Unknown"` when untagged.
    pub road_name: String,
    /// Whether the limit was inferred from the road classification rather
    /// than taken from an explicit `maxspeed` tag.
    pub inferred: bool,
}

/// The first candidate road segment of one Overpass response.
///
/// Candidate selection keeps whatever the service returned first; closeness
/// is delegated to the query radius, not re-ranked locally.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaySnapshot {
    /// OSM way id.
    pub id: i64,
    /// Raw OSM tags (`highway`, `maxspeed`, `name`, `ref`, ...).
    pub tags: BTreeMap<String, String>,
}

impl WaySnapshot {
    /// Creates a snapshot from an id and tag mapping.
    #[must_use]
    pub const fn new(id: i64, tags: BTreeMap<String, String>) -> Self {
        Self { id, tags }
    }
}
