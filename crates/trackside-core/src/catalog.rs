//! Channel catalog
//!
//! Static declaration of every telemetry channel, its category and the rule
//! used to decode it. The decoder, the store and the session log schema are
//! all derived from the same [`Catalog`] so they can never disagree.

use serde::{Deserialize, Serialize};

/// Composite wire field carrying `"<lat> <lon>"`
pub const GPS_COMPOSITE_FIELD: &str = "GPSCoords";

/// Wire field carrying the raw steering encoder value
pub const STEERING_FIELD: &str = "Raw_Direction";

/// Wire field carrying the state flag
pub const FLAG_FIELD: &str = "Flag";

/// Channel category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelCategory {
    /// Engine, inverter and battery temperatures
    Temperature,
    /// Vehicle, GPS and engine speeds
    Speed,
    /// Suspension travel
    Suspension,
    /// Brake and accelerator pedals
    Pedal,
    /// Steering angle
    Direction,
    /// GPS latitude
    GpsLatitude,
    /// GPS longitude
    GpsLongitude,
    /// Track flag
    Flag,
    /// Accelerometer axes
    Accelerometer,
}

impl ChannelCategory {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ChannelCategory::Temperature => "Temperatures",
            ChannelCategory::Speed => "Speeds",
            ChannelCategory::Suspension => "Suspensions",
            ChannelCategory::Pedal => "Pedals",
            ChannelCategory::Direction => "Direction",
            ChannelCategory::GpsLatitude => "GPS Latitude",
            ChannelCategory::GpsLongitude => "GPS Longitude",
            ChannelCategory::Flag => "Flags",
            ChannelCategory::Accelerometer => "Accelerometer",
        }
    }
}

/// How a channel's raw value becomes a physical value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeRule {
    /// Parse as floating point
    Numeric,
    /// Parse as integer, divide by 10
    FixedPointTenths,
    /// Unwrap the encoder discontinuity, then remap to degrees
    SteeringAngle,
    /// First token of the GPS composite field
    GpsLatitude,
    /// Second token of the GPS composite field
    GpsLongitude,
    /// Parsed numerically, no scaling; transitions are tracked
    Flag,
}

/// A single telemetry channel definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// Channel name, also the wire key for non-composite channels
    pub name: &'static str,
    /// Category
    pub category: ChannelCategory,
    /// Decode rule
    pub rule: DecodeRule,
}

impl Channel {
    const fn new(name: &'static str, category: ChannelCategory, rule: DecodeRule) -> Self {
        Self {
            name,
            category,
            rule,
        }
    }

    /// Wire field this channel is decoded from
    pub fn source_field(&self) -> &'static str {
        match self.rule {
            DecodeRule::GpsLatitude | DecodeRule::GpsLongitude => GPS_COMPOSITE_FIELD,
            _ => self.name,
        }
    }

    /// Whether this channel comes from the GPS composite field
    pub fn is_gps(&self) -> bool {
        matches!(self.rule, DecodeRule::GpsLatitude | DecodeRule::GpsLongitude)
    }
}

/// Which channel set to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogVariant {
    /// Every channel including battery, engine speed, GPS and accelerometer
    #[default]
    Full,
    /// Base channels only, temperatures sent as plain numbers
    Reduced,
}

use ChannelCategory as C;
use DecodeRule as R;

const TEMPERATURES: &[&str] = &[
    "Left_Engine_Temp",
    "Right_Engine_Temp",
    "Left_Inverter_Temperature",
    "Right_Inverter_Temperature",
    "Right_Gearbox_Temp",
    "Right_Radiator_Temp",
    "Left_Gearbox_Temp",
    "Left_Radiator_Temp",
];

const BATTERY_TEMPERATURES: &[&str] = &[
    "HV_Battery_Temp_Max",
    "HV_Battery_Temp_Mean",
    "HV_Battery_Temp_Min",
];

const SPEEDS: &[&str] = &["Car_Speed", "GSPSpeed"];

const ENGINE_SPEEDS: &[&str] = &["Left_Engine_Speed", "Right_Engine_Speed"];

const SUSPENSIONS: &[&str] = &[
    "Suspension_Back_Left",
    "Suspension_Back_Right",
    "Suspension_Front_Left",
    "Suspension_Front_Right",
];

const PEDALS: &[&str] = &["Brake_Pedal", "Accelerator_Pedal"];

const ACCELEROMETER: &[&str] = &["Accelerometer_X", "Accelerometer_Y", "Accelerometer_Z"];

fn push(
    channels: &mut Vec<Channel>,
    names: &[&'static str],
    category: ChannelCategory,
    rule: DecodeRule,
) {
    channels.extend(names.iter().map(|&name| Channel::new(name, category, rule)));
}

/// Ordered set of channels
///
/// Catalog order is the column order of the session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    variant: CatalogVariant,
    channels: Vec<Channel>,
}

impl Catalog {
    /// Build the catalog for a variant
    pub fn new(variant: CatalogVariant) -> Self {
        let full = variant == CatalogVariant::Full;
        let temperature_rule = if full { R::FixedPointTenths } else { R::Numeric };

        let mut channels = Vec::new();
        push(&mut channels, TEMPERATURES, C::Temperature, temperature_rule);
        if full {
            push(&mut channels, BATTERY_TEMPERATURES, C::Temperature, temperature_rule);
        }
        push(&mut channels, SPEEDS, C::Speed, R::Numeric);
        if full {
            push(&mut channels, ENGINE_SPEEDS, C::Speed, R::Numeric);
        }
        push(&mut channels, SUSPENSIONS, C::Suspension, R::Numeric);
        push(&mut channels, PEDALS, C::Pedal, R::Numeric);
        push(&mut channels, &[STEERING_FIELD], C::Direction, R::SteeringAngle);
        if full {
            push(&mut channels, &["lat"], C::GpsLatitude, R::GpsLatitude);
            push(&mut channels, &["lon"], C::GpsLongitude, R::GpsLongitude);
        }
        push(&mut channels, &[FLAG_FIELD], C::Flag, R::Flag);
        if full {
            push(&mut channels, ACCELEROMETER, C::Accelerometer, R::Numeric);
        }

        Self { variant, channels }
    }

    /// The full channel set
    pub fn full() -> Self {
        Self::new(CatalogVariant::Full)
    }

    /// The reduced channel set
    pub fn reduced() -> Self {
        Self::new(CatalogVariant::Reduced)
    }

    /// Variant this catalog was built from
    pub fn variant(&self) -> CatalogVariant {
        self.variant
    }

    /// All channels in catalog order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Look up a channel by name
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Find the index of a channel by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Channels of one category, in catalog order
    pub fn by_category(&self, category: ChannelCategory) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |c| c.category == category)
    }

    /// Whether the catalog decodes the GPS composite field
    pub fn has_gps(&self) -> bool {
        self.channels.iter().any(Channel::is_gps)
    }

    /// Column names of the session log, in order
    ///
    /// `timestamp`, every channel, then the raw steering, GPS composite and
    /// flag fields.
    pub fn log_columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::with_capacity(self.channels.len() + 4);
        columns.push("timestamp");
        columns.extend(self.channels.iter().map(|c| c.name));
        columns.extend([STEERING_FIELD, GPS_COMPOSITE_FIELD, FLAG_FIELD]);
        columns
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_catalog_contents() {
        let catalog = Catalog::full();

        assert_eq!(catalog.len(), 28);
        assert!(catalog.has_gps());
        assert_eq!(catalog.by_category(ChannelCategory::Temperature).count(), 11);
        assert_eq!(
            catalog.channel("HV_Battery_Temp_Mean").map(|c| c.rule),
            Some(DecodeRule::FixedPointTenths)
        );
        assert_eq!(
            catalog.channel("lat").map(|c| c.source_field()),
            Some(GPS_COMPOSITE_FIELD)
        );
    }

    #[test]
    fn test_reduced_catalog_contents() {
        let catalog = Catalog::reduced();

        assert_eq!(catalog.len(), 18);
        assert!(!catalog.has_gps());
        assert!(catalog.channel("Accelerometer_X").is_none());
        assert!(catalog.channel("Left_Engine_Speed").is_none());
        assert_eq!(
            catalog.channel("Left_Engine_Temp").map(|c| c.rule),
            Some(DecodeRule::Numeric)
        );
    }

    #[test]
    fn test_log_columns_order() {
        let catalog = Catalog::reduced();
        let columns = catalog.log_columns();

        assert_eq!(columns.first(), Some(&"timestamp"));
        assert_eq!(columns.get(1), Some(&"Left_Engine_Temp"));
        assert_eq!(
            &columns[columns.len() - 3..],
            &["Raw_Direction", "GPSCoords", "Flag"]
        );
        assert_eq!(columns.len(), catalog.len() + 4);
    }
}
