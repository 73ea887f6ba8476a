//! Wire types for the remote CRUD API.
//!
//! The remote API is plain JSON CRUD over a single resource collection,
//! keyed by entity id, with `lastModified` round-tripped as ISO-8601 UTC.
//! [`Entity`](crate::Entity) serializes directly to the wire shape, so the
//! only extra type needed here is the list-query filter.

use serde::{Deserialize, Serialize};

/// A rectangular geographic filter for the list/query endpoint.
///
/// Bounds are degrees; latitude in `[-90, 90]`, longitude in
/// `[-180, 180]`. The filter is passed through to the remote store
/// verbatim; the engine never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionFilter {
    /// Southern latitude bound (minimum).
    pub south: f64,
    /// Western longitude bound (minimum).
    pub west: f64,
    /// Northern latitude bound (maximum).
    pub north: f64,
    /// Eastern longitude bound (maximum).
    pub east: f64,
}

impl RegionFilter {
    /// Creates a new region filter.
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Encodes the filter as URL query parameters.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        format!(
            "south={}&west={}&north={}&east={}",
            self.south, self.west, self.north, self.east
        )
    }
}
