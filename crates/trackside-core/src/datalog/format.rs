//! Session log format
//!
//! Comma-separated rows: `timestamp`, one column per catalog channel, then
//! the raw steering, GPS composite and flag fields. Channel columns hold
//! the value as it arrived on the wire, except `lat`/`lon` which hold the
//! decoded coordinates. Absent values are written as `0` (`"0 0"` for the
//! GPS composite).

use std::path::Path;

use chrono::{Local, NaiveDateTime};

use crate::catalog::{Catalog, FLAG_FIELD, GPS_COMPOSITE_FIELD, STEERING_FIELD};
use crate::record::{NormalizedRecord, RawRecord, RawValue, TIMESTAMP_FORMAT};

/// Session log file extension
pub const LOG_EXTENSION: &str = "csv";

/// Column holding the record timestamp
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Placeholder for an absent scalar
pub const MISSING_VALUE: &str = "0";

/// Placeholder for an absent GPS composite
pub const MISSING_GPS: &str = "0 0";

/// Check whether a path looks like a session log
pub fn is_session_log(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(LOG_EXTENSION))
        .unwrap_or(false)
}

/// Build the log row for a decoded record and the raw record it came from
pub fn encode_row(catalog: &Catalog, record: &NormalizedRecord, raw: &RawRecord) -> Vec<String> {
    let raw_or = |field: &str, missing: &str| {
        raw.get(field)
            .map(RawValue::to_string)
            .unwrap_or_else(|| missing.to_string())
    };

    let mut row = Vec::with_capacity(catalog.len() + 4);
    row.push(record.timestamp_string());
    for channel in catalog.channels() {
        let cell = if channel.is_gps() {
            record
                .get(channel.name)
                .map(|v| v.to_string())
                .unwrap_or_else(|| MISSING_VALUE.to_string())
        } else {
            raw_or(channel.name, MISSING_VALUE)
        };
        row.push(cell);
    }
    row.push(raw_or(STEERING_FIELD, MISSING_VALUE));
    row.push(raw_or(GPS_COMPOSITE_FIELD, MISSING_GPS));
    row.push(raw_or(FLAG_FIELD, MISSING_VALUE));
    row
}

/// Rebuild a raw record from one log row
///
/// Duplicate column names resolve to the last occurrence. When the row has
/// no GPS composite but has `lat` and `lon`, the composite is rebuilt from
/// them.
pub fn decode_row<'a, I>(headers: &[String], cells: I) -> RawRecord
where
    I: IntoIterator<Item = &'a str>,
{
    let mut timestamp = None;
    let mut record = RawRecord::at(NaiveDateTime::MIN);

    for (header, cell) in headers.iter().zip(cells) {
        if header == TIMESTAMP_COLUMN {
            timestamp = NaiveDateTime::parse_from_str(cell.trim(), TIMESTAMP_FORMAT).ok();
        } else {
            record.insert(header.as_str(), cell);
        }
    }

    if !record.contains(GPS_COMPOSITE_FIELD) {
        let lat = record.get("lat").map(RawValue::to_string);
        let lon = record.get("lon").map(RawValue::to_string);
        if let (Some(lat), Some(lon)) = (lat, lon) {
            record.insert(GPS_COMPOSITE_FIELD, format!("{} {}", lat, lon));
        }
    }

    record.timestamp = timestamp.unwrap_or_else(|| Local::now().naive_local());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::RecordDecoder;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_session_log_detection() {
        assert!(is_session_log(Path::new("data/telemetry_data_20240601_100000.csv")));
        assert!(is_session_log(Path::new("LOG.CSV")));
        assert!(!is_session_log(Path::new("log.mlg")));
        assert!(!is_session_log(Path::new("csv")));
    }

    #[test]
    fn test_encode_row_defaults() {
        let catalog = Catalog::full();
        let raw = RawRecord::new().with("Car_Speed", 42.5);
        let record = RecordDecoder::default().decode(&raw);

        let row = encode_row(&catalog, &record, &raw);
        let columns = catalog.log_columns();
        assert_eq!(row.len(), columns.len());

        let cell = |name: &str| {
            let idx = columns.iter().position(|c| *c == name).unwrap();
            row[idx].clone()
        };
        assert_eq!(cell("Car_Speed"), "42.5");
        assert_eq!(cell("Brake_Pedal"), "0");
        assert_eq!(cell("lat"), "0");
        assert_eq!(cell("GPSCoords"), "0 0");
    }

    #[test]
    fn test_encode_row_keeps_wire_values() {
        let catalog = Catalog::full();
        let raw = RawRecord::new()
            .with("Left_Engine_Temp", 235i64)
            .with("Raw_Direction", 2499i64)
            .with("GPSCoords", "46.207 7.620")
            .with("Flag", 3i64);
        let record = RecordDecoder::default().decode(&raw);

        let row = encode_row(&catalog, &record, &raw);
        let columns = catalog.log_columns();
        let cell = |name: &str| row[catalog.index_of(name).unwrap() + 1].clone();

        assert_eq!(cell("Left_Engine_Temp"), "235");
        assert_eq!(cell("Raw_Direction"), "2499");
        assert_eq!(cell("lat"), "46.207");
        assert_eq!(cell("lon"), "7.62");
        assert_eq!(&row[columns.len() - 3..], &["2499", "46.207 7.620", "3"]);
    }

    #[test]
    fn test_decode_row_timestamp_and_last_wins() {
        let headers = headers(&["timestamp", "Flag", "Car_Speed", "Flag"]);
        let record = decode_row(
            &headers,
            ["2024-06-01T10:00:00.250000", "1", "12.5", "2"],
        );

        assert_eq!(
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "2024-06-01T10:00:00.250000"
        );
        assert_eq!(record.get("Flag"), Some(&RawValue::from("2")));
        assert_eq!(record.get("Car_Speed").and_then(RawValue::as_f64), Some(12.5));
    }

    #[test]
    fn test_decode_row_rebuilds_gps() {
        let headers = headers(&["timestamp", "lat", "lon"]);
        let record = decode_row(&headers, ["bad", "46.207", "7.62"]);

        assert_eq!(
            record.get("GPSCoords").and_then(RawValue::as_str),
            Some("46.207 7.62")
        );
        assert!(record.timestamp > NaiveDateTime::MIN);
    }
}
