//! Trip lookup built from the static schedule.

use std::collections::HashMap;

use crate::models::{TripRecord, TripRow};

/// Read-only map from `trip_id` to trip metadata for one run.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    trips: HashMap<String, TripRecord>,
}

impl ScheduleIndex {
    /// Build the index from raw schedule rows.
    ///
    /// Rows without a trip id are dropped. When a trip id repeats, the first
    /// row wins.
    pub fn build(rows: impl IntoIterator<Item = TripRow>) -> Self {
        let mut trips = HashMap::new();
        let mut dropped = 0usize;

        for row in rows {
            match TripRecord::from_row(row) {
                Some(record) => {
                    trips.entry(record.trip_id.clone()).or_insert(record);
                }
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            log::debug!("Dropped {} schedule rows without trip_id", dropped);
        }

        Self { trips }
    }

    /// Exact-match lookup.
    pub fn lookup(&self, trip_id: &str) -> Option<&TripRecord> {
        self.trips.get(trip_id)
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

impl FromIterator<TripRecord> for ScheduleIndex {
    fn from_iter<I: IntoIterator<Item = TripRecord>>(iter: I) -> Self {
        let mut trips = HashMap::new();
        for record in iter {
            trips.entry(record.trip_id.clone()).or_insert(record);
        }
        Self { trips }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(trip_id: Option<&str>, route: &str, headsign: &str) -> TripRow {
        TripRow {
            trip_id: trip_id.map(String::from),
            route_id: Some(route.to_string()),
            trip_short_name: Some("227".to_string()),
            trip_headsign: Some(headsign.to_string()),
        }
    }

    #[test]
    fn test_build_and_lookup() {
        let index = ScheduleIndex::build(vec![
            row(Some("T1"), "91", "Union Station"),
            row(Some("T2"), "VC", "Lancaster"),
        ]);

        assert_eq!(index.len(), 2);
        let trip = index.lookup("T1").unwrap();
        assert_eq!(trip.route_id, "91");
        assert_eq!(trip.trip_headsign, "Union Station");
        assert!(index.lookup("T9").is_none());
    }

    #[test]
    fn test_rows_without_trip_id_are_dropped() {
        let index = ScheduleIndex::build(vec![
            row(None, "91", "Nowhere"),
            row(Some(""), "91", "Nowhere"),
            row(Some("T1"), "91", "Union Station"),
        ]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_lookup_is_exact() {
        let index = ScheduleIndex::build(vec![row(Some("T1"), "91", "Union Station")]);
        assert!(index.lookup("t1").is_none());
        assert!(index.lookup(" T1").is_none());
    }

    #[test]
    fn test_first_row_wins_on_duplicate() {
        let index = ScheduleIndex::build(vec![
            row(Some("T1"), "91", "Union Station"),
            row(Some("T1"), "VC", "Lancaster"),
        ]);
        assert_eq!(index.lookup("T1").unwrap().route_id, "91");
    }

    #[test]
    fn test_empty_input() {
        let index = ScheduleIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.lookup("T1").is_none());
    }
}
