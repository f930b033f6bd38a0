#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Overpass API client and speed-limit resolution policy.
//!
//! One spatial query per vehicle position: a 10-meter `around` search for
//! road ways (pedestrian/foot/cycle types excluded), keeping only the first
//! returned way. Rate limiting (HTTP 429) is retried with bounded
//! exponential backoff; every other failure is reported to the caller, who
//! downgrades it to "no result" for that position.
//!
//! The [`policy`] module turns the raw OSM tags of a way into a speed limit
//! in km/h, either explicit (`maxspeed` tag) or inferred from the road
//! classification.

pub mod client;
pub mod policy;
pub mod retry;

use async_trait::async_trait;
use speed_map_models::WaySnapshot;
use thiserror::Error;

/// Errors from Overpass API operations.
#[derive(Debug, Error)]
pub enum OverpassError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit exceeded (HTTP 429) after all retries.
    #[error("Rate limited by Overpass API")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("Overpass API returned HTTP {0}")]
    Status(u16),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Seam between the batch scheduler and the network.
///
/// Implemented by [`client::OverpassClient`] for production; scheduler tests
/// substitute scripted lookups.
#[async_trait]
pub trait WayLookup: Send + Sync {
    /// Returns the first road way within the query radius of the given
    /// coordinates, or `None` if the service found nothing there.
    ///
    /// # Errors
    ///
    /// Returns [`OverpassError`] if the query fails after exhausting any
    /// applicable retries.
    async fn nearest_way(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<WaySnapshot>, OverpassError>;
}
