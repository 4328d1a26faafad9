//! Static schedule trip data.

use serde::{Deserialize, Serialize};

/// A raw row of GTFS `trips.txt` as it comes out of the CSV reader.
///
/// Every column is optional so that malformed rows survive parsing and can
/// be dropped by the index instead of failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TripRow {
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub trip_short_name: Option<String>,
    #[serde(default)]
    pub trip_headsign: Option<String>,
}

/// A trip from the static schedule, keyed by `trip_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRecord {
    pub trip_id: String,
    pub route_id: String,
    pub trip_short_name: String,
    pub trip_headsign: String,
}

impl TripRecord {
    /// Convert a raw row into a record.
    ///
    /// Returns `None` when the row has no usable trip identifier.
    pub fn from_row(row: TripRow) -> Option<Self> {
        let trip_id = row.trip_id.filter(|id| !id.is_empty())?;
        Some(Self {
            trip_id,
            route_id: row.route_id.unwrap_or_default(),
            trip_short_name: row.trip_short_name.unwrap_or_default(),
            trip_headsign: row.trip_headsign.unwrap_or_default(),
        })
    }
}
