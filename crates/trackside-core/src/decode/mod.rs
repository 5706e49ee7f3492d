//! Record Decoding
//!
//! Turns a [`RawRecord`] into a [`NormalizedRecord`] using the catalog's
//! decode rules. Decoding never fails as a whole: a field that cannot be
//! parsed is left out of the output and reported as a [`FieldIssue`].

pub mod rules;

use std::sync::Arc;

use crate::catalog::{Catalog, DecodeRule, GPS_COMPOSITE_FIELD};
use crate::record::{ChannelValue, NormalizedRecord, RawRecord, RawValue};

/// Why a field was left out of a decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// The value could not be parsed for the channel's rule
    Unparsable,
    /// The GPS composite was not two numeric tokens
    MalformedGps,
    /// The catalog expects GPS but the record carried none
    MissingGps,
}

/// A field dropped while decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Wire field name
    pub field: String,
    /// Raw value as text, if there was one
    pub raw: Option<String>,
    /// What went wrong
    pub kind: IssueKind,
}

impl FieldIssue {
    fn new(field: &str, raw: Option<&RawValue>, kind: IssueKind) -> Self {
        Self {
            field: field.to_string(),
            raw: raw.map(ToString::to_string),
            kind,
        }
    }
}

/// Stateless record decoder bound to a catalog
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    catalog: Arc<Catalog>,
}

impl RecordDecoder {
    /// Create a decoder for a catalog
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// The catalog used by this decoder
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Decode a raw record, dropping unparsable fields silently
    pub fn decode(&self, raw: &RawRecord) -> NormalizedRecord {
        self.decode_with_issues(raw).0
    }

    /// Decode a raw record and report which fields were dropped
    ///
    /// Fields not in the catalog are ignored without an issue.
    pub fn decode_with_issues(&self, raw: &RawRecord) -> (NormalizedRecord, Vec<FieldIssue>) {
        let mut values = Vec::with_capacity(self.catalog.len());
        let mut issues = Vec::new();

        let gps = if self.catalog.has_gps() {
            decode_gps(raw, &mut issues)
        } else {
            None
        };

        for channel in self.catalog.channels() {
            let value = match channel.rule {
                DecodeRule::GpsLatitude => gps.map(|(lat, _)| lat),
                DecodeRule::GpsLongitude => gps.map(|(_, lon)| lon),
                rule => {
                    let Some(field) = raw.get(channel.name) else {
                        continue;
                    };
                    let decoded = decode_scalar(rule, field);
                    if decoded.is_none() {
                        issues.push(FieldIssue::new(
                            channel.name,
                            Some(field),
                            IssueKind::Unparsable,
                        ));
                    }
                    decoded
                }
            };

            if let Some(value) = value {
                values.push(ChannelValue {
                    channel: channel.name,
                    value,
                });
            }
        }

        (NormalizedRecord::new(raw.timestamp, values), issues)
    }
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new(Arc::new(Catalog::default()))
    }
}

fn decode_scalar(rule: DecodeRule, field: &RawValue) -> Option<f64> {
    match rule {
        DecodeRule::Numeric => field.as_f64(),
        // NaN never compares equal, so it could not be tracked for transitions
        DecodeRule::Flag => field.as_f64().filter(|v| v.is_finite()),
        DecodeRule::FixedPointTenths => field.as_i64().map(rules::fixed_point_tenths),
        DecodeRule::SteeringAngle => field.as_i64().map(rules::steering_angle),
        DecodeRule::GpsLatitude | DecodeRule::GpsLongitude => None,
    }
}

fn decode_gps(raw: &RawRecord, issues: &mut Vec<FieldIssue>) -> Option<(f64, f64)> {
    let Some(field) = raw.get(GPS_COMPOSITE_FIELD) else {
        issues.push(FieldIssue::new(GPS_COMPOSITE_FIELD, None, IssueKind::MissingGps));
        return None;
    };

    let parsed = match field {
        RawValue::Text(s) => rules::parse_gps(s),
        other => rules::parse_gps(&other.to_string()),
    };
    if parsed.is_none() {
        issues.push(FieldIssue::new(
            GPS_COMPOSITE_FIELD,
            Some(field),
            IssueKind::MalformedGps,
        ));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_ignored() {
        let decoder = RecordDecoder::default();
        let raw = RawRecord::new()
            .with("Car_Speed", 12.0)
            .with("Not_A_Channel", 1i64)
            .with("GPSCoords", "46.207 7.620");

        let (record, issues) = decoder.decode_with_issues(&raw);
        assert_eq!(record.len(), 3);
        assert!(issues.is_empty());
        assert!(!record.contains("Not_A_Channel"));
    }

    #[test]
    fn test_reduced_catalog_skips_gps() {
        let decoder = RecordDecoder::new(Arc::new(Catalog::reduced()));
        let raw = RawRecord::new()
            .with("GPSCoords", "46.207 7.620")
            .with("Left_Engine_Temp", "45.5");

        let (record, issues) = decoder.decode_with_issues(&raw);
        assert!(issues.is_empty());
        assert_eq!(record.get("Left_Engine_Temp"), Some(45.5));
        assert!(!record.contains("lat"));
    }

    #[test]
    fn test_non_finite_flag_rejected() {
        let decoder = RecordDecoder::default();
        for text in ["NaN", "nan", "inf", "-inf"] {
            let raw = RawRecord::new()
                .with("Flag", text)
                .with("GPSCoords", "46.207 7.620");
            let (record, issues) = decoder.decode_with_issues(&raw);

            assert!(!record.contains("Flag"));
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].kind, IssueKind::Unparsable);
        }
    }

    #[test]
    fn test_unparsable_field_reported() {
        let decoder = RecordDecoder::default();
        let raw = RawRecord::new()
            .with("Brake_Pedal", "pressed")
            .with("Accelerator_Pedal", "1800")
            .with("GPSCoords", "46.207 7.620");

        let (record, issues) = decoder.decode_with_issues(&raw);
        assert_eq!(record.get("Accelerator_Pedal"), Some(1800.0));
        assert!(!record.contains("Brake_Pedal"));
        assert_eq!(
            issues,
            vec![FieldIssue {
                field: "Brake_Pedal".to_string(),
                raw: Some("pressed".to_string()),
                kind: IssueKind::Unparsable,
            }]
        );
    }
}
