//! Speed-limit resolution policy.
//!
//! Maps the raw OSM tags of a matched way to a speed limit in km/h. An
//! explicit `maxspeed` tag wins when it parses; otherwise the limit is
//! inferred from the `highway` classification with a fixed lookup table.
//! Unknown classifications fall back to 80 km/h rather than "no limit", so
//! every matched way resolves to a record.

use std::collections::BTreeMap;

/// Conversion factor from miles per hour to km/h.
pub const MPH_TO_KMH: f64 = 1.609_34;

/// Road name used when a way carries neither `name` nor `ref`.
pub const UNKNOWN_ROAD: &str = "Unknown";

/// A resolved speed limit and how it was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLimit {
    /// Speed limit in km/h.
    pub speed_limit: i32,
    /// `true` when inferred from the road classification, `false` when
    /// taken from an explicit `maxspeed` tag.
    pub inferred: bool,
}

/// Resolves a speed limit from a way's tag mapping.
///
/// An unparseable `maxspeed` value (`"walk"`, `"DE:urban"`, ...) falls
/// through to inference instead of failing the record.
#[must_use]
pub fn resolve(tags: &BTreeMap<String, String>) -> ResolvedLimit {
    if let Some(raw) = tags.get("maxspeed") {
        if let Some(speed_limit) = parse_maxspeed(raw) {
            return ResolvedLimit {
                speed_limit,
                inferred: false,
            };
        }
        log::debug!("Invalid maxspeed format: {raw}, falling back to inference");
    }

    let class = tags.get("highway").map(|value| value.to_lowercase());
    ResolvedLimit {
        speed_limit: infer_from_highway(class.as_deref()),
        inferred: true,
    }
}

/// Returns the way's display name: `name` tag, then `ref` tag, then
/// [`UNKNOWN_ROAD`].
#[must_use]
pub fn road_name(tags: &BTreeMap<String, String>) -> String {
    tags.get("name")
        .or_else(|| tags.get("ref"))
        .map_or_else(|| UNKNOWN_ROAD.to_string(), Clone::clone)
}

/// Parses a `maxspeed` tag value into km/h.
///
/// Values with an `mph` marker are converted with [`MPH_TO_KMH`] and
/// rounded; everything else is read as km/h with an optional `km/h`
/// suffix.
fn parse_maxspeed(raw: &str) -> Option<i32> {
    let lower = raw.to_lowercase();

    if let Some((value, _)) = lower.split_once("mph") {
        let mph: f64 = value.trim().parse().ok()?;
        #[allow(clippy::cast_possible_truncation)]
        return Some((mph * MPH_TO_KMH).round() as i32);
    }

    lower.trim_end_matches("km/h").trim().parse().ok()
}

/// Fixed inference table from the `highway` classification (lowercased).
fn infer_from_highway(class: Option<&str>) -> i32 {
    match class {
        Some("residential" | "service" | "tertiary") => 50,
        Some("construction") => 70,
        // unclassified, unrecognized, and missing all share the default
        _ => 80,
    }
}
