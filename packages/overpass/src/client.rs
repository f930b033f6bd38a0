//! Overpass API HTTP client.
//!
//! Sends one bounded-radius spatial query per position as an HTTP POST with
//! the raw Overpass QL text as the request body, and keeps at most the first
//! way of the response. Public instances are shared infrastructure: keep the
//! concurrency ceiling and inter-batch delay conservative, and set a real
//! user agent on the `reqwest::Client`.
//!
//! See <https://wiki.openstreetmap.org/wiki/Overpass_API>

use std::collections::BTreeMap;

use async_trait::async_trait;
use speed_map_models::WaySnapshot;

use crate::retry::{RetryPolicy, retry_rate_limited};
use crate::{OverpassError, WayLookup};

/// Radius in meters for the `around` query.
pub const QUERY_RADIUS_M: u32 = 10;

/// Highway types excluded from matching (not roads a vehicle drives on).
pub const EXCLUDED_HIGHWAY_TYPES: &str = "footway|path|cycleway|pedestrian";

/// Overpass API client with bounded rate-limit retry.
pub struct OverpassClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OverpassClient {
    /// Creates a client for the given interpreter endpoint with the default
    /// retry policy.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self::with_retry(http, base_url, RetryPolicy::default())
    }

    /// Creates a client with an explicit retry policy.
    #[must_use]
    pub const fn with_retry(http: reqwest::Client, base_url: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url,
            retry,
        }
    }

    /// Issues the query once, without retrying.
    async fn query_once(&self, query: &str) -> Result<Option<WaySnapshot>, OverpassError> {
        let resp = self
            .http
            .post(&self.base_url)
            .body(query.to_string())
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OverpassError::RateLimited);
        }
        if !status.is_success() {
            return Err(OverpassError::Status(status.as_u16()));
        }

        let body: serde_json::Value = resp.json().await?;
        parse_first_way(&body)
    }
}

#[async_trait]
impl WayLookup for OverpassClient {
    async fn nearest_way(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<WaySnapshot>, OverpassError> {
        let query = build_query(latitude, longitude);
        retry_rate_limited(&self.retry, || {
            let query = query.clone();
            async move { self.query_once(&query).await }
        })
        .await
    }
}

/// Builds the Overpass QL text for one position lookup.
fn build_query(latitude: f64, longitude: f64) -> String {
    format!(
        "[out:json];\n\
         way(around:{QUERY_RADIUS_M},{latitude},{longitude})[\"highway\"]\n\
           [\"highway\"!~\"{EXCLUDED_HIGHWAY_TYPES}\"];\n\
         out center;"
    )
}

/// Parses an Overpass JSON response down to its first way.
///
/// Returns `None` when the `elements` array is empty. A way without a
/// `tags` object yields an empty tag map rather than an error.
fn parse_first_way(body: &serde_json::Value) -> Result<Option<WaySnapshot>, OverpassError> {
    let elements = body["elements"]
        .as_array()
        .ok_or_else(|| OverpassError::Parse {
            message: "Overpass response has no elements array".to_string(),
        })?;

    let Some(first) = elements.first() else {
        return Ok(None);
    };

    let id = first["id"].as_i64().ok_or_else(|| OverpassError::Parse {
        message: "Missing way id in Overpass element".to_string(),
    })?;

    let tags: BTreeMap<String, String> = first["tags"].as_object().map_or_else(BTreeMap::new, |map| {
        map.iter()
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect()
    });

    Ok(Some(WaySnapshot::new(id, tags)))
}
