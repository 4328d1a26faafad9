//! GTFS static schedule parsing.

use std::io::{Cursor, Read};

use csv::{ReaderBuilder, Trim};
use zip::ZipArchive;

use crate::error::{AppError, Result};
use crate::models::TripRow;

const TRIPS_FILE: &str = "trips.txt";

/// Extract and parse `trips.txt` from a GTFS zip archive.
///
/// Feeds that wrap everything in a single top-level folder are accepted.
pub fn parse_trips_archive(bytes: &[u8]) -> Result<Vec<TripRow>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let name = find_trips_entry(archive.file_names())
        .ok_or_else(|| AppError::upstream("schedule", format!("{TRIPS_FILE} not found in archive")))?;

    let entry = archive.by_name(&name)?;
    log::debug!("Reading {} ({} bytes)", name, entry.size());
    parse_trips_csv(entry)
}

fn find_trips_entry<'a>(names: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut nested = None;
    for name in names {
        if name == TRIPS_FILE {
            return Some(name.to_string());
        }
        if nested.is_none()
            && name
                .strip_suffix(TRIPS_FILE)
                .and_then(|dir| dir.strip_suffix('/'))
                .is_some_and(|dir| !dir.is_empty() && !dir.contains('/'))
        {
            nested = Some(name.to_string());
        }
    }
    nested
}

/// Parse `trips.txt` CSV content with a header row.
///
/// Rows that fail to deserialize are skipped with a warning.
pub fn parse_trips_csv(reader: impl Read) -> Result<Vec<TripRow>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    reader.headers()?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<TripRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping malformed trips.txt row: {}", e);
            }
        }
    }

    log::info!("Parsed {} trip rows ({} skipped)", rows.len(), skipped);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const TRIPS: &str = "route_id,service_id,trip_id,trip_headsign,trip_short_name\n\
                         91,WK,T42,Union Station,227\n\
                         94,WK,T43,Oceanside,601\n";

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_trips_from_archive() {
        let bytes = archive(&[("agency.txt", "agency_id\nMETROLINK\n"), ("trips.txt", TRIPS)]);
        let rows = parse_trips_archive(&bytes).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trip_id.as_deref(), Some("T42"));
        assert_eq!(rows[0].route_id.as_deref(), Some("91"));
        assert_eq!(rows[0].trip_short_name.as_deref(), Some("227"));
        assert_eq!(rows[0].trip_headsign.as_deref(), Some("Union Station"));
    }

    #[test]
    fn test_trips_in_single_folder() {
        let bytes = archive(&[("gtfs/trips.txt", TRIPS)]);
        assert_eq!(parse_trips_archive(&bytes).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_trips_is_upstream_error() {
        let bytes = archive(&[("stops.txt", "stop_id\nS1\n")]);
        let err = parse_trips_archive(&bytes).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_garbage_archive_fails() {
        assert!(matches!(
            parse_trips_archive(b"not a zip"),
            Err(AppError::Zip(_))
        ));
    }

    #[test]
    fn test_missing_columns_are_none() {
        let rows = parse_trips_csv("trip_id,route_id\nT1,91\nT2\n".as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trip_headsign, None);
        assert_eq!(rows[1].trip_id.as_deref(), Some("T2"));
        assert_eq!(rows[1].route_id, None);
    }

    #[test]
    fn test_values_are_kept_byte_exact() {
        let rows = parse_trips_csv(" trip_id , route_id\n T7 ,91 \n".as_bytes()).unwrap();
        assert_eq!(rows[0].trip_id.as_deref(), Some(" T7 "));
        assert_eq!(rows[0].route_id.as_deref(), Some("91 "));
    }

    #[test]
    fn test_find_trips_entry_prefers_root() {
        let names = ["a/trips.txt", "trips.txt"];
        assert_eq!(
            find_trips_entry(names.into_iter()).as_deref(),
            Some("trips.txt")
        );
        let deep = ["a/b/trips.txt", "xtrips.txt"];
        assert_eq!(find_trips_entry(deep.into_iter()), None);
    }
}
