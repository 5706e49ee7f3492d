//! Field decode rules
//!
//! Pure numeric conversions applied to individual wire fields:
//! - Steering: encoder unwrap and remap to degrees
//! - Temperature: one-decimal fixed point
//! - GPS: `"<lat> <lon>"` composite split

/// Raw steering values below this are shifted up, the rest wrap down
pub const STEERING_WRAP_THRESHOLD: i64 = 2500;
/// Offset added below the wrap threshold
pub const STEERING_LOW_OFFSET: i64 = 200;
/// Offset subtracted at or above the wrap threshold
pub const STEERING_HIGH_OFFSET: i64 = 3000;
/// Unwrapped encoder value at full left lock
pub const STEERING_IN_MIN: f64 = 2600.0;
/// Unwrapped encoder value at full right lock
pub const STEERING_IN_MAX: f64 = 122.0;
/// Steering range in degrees (symmetric)
pub const STEERING_MAX_DEGREES: f64 = 140.0;

/// Linearly remap `x` from `[in_min, in_max]` to `[out_min, out_max]`
///
/// The input domain may be decreasing, which inverts the output.
pub fn map_range(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Correct the steering encoder wraparound at the 2500..3000 boundary
pub fn unwrap_steering(raw: i64) -> i64 {
    if raw < STEERING_WRAP_THRESHOLD {
        raw + STEERING_LOW_OFFSET
    } else {
        raw - STEERING_HIGH_OFFSET
    }
}

/// Convert a raw steering encoder value to degrees
pub fn steering_angle(raw: i64) -> f64 {
    map_range(
        unwrap_steering(raw) as f64,
        STEERING_IN_MIN,
        STEERING_IN_MAX,
        -STEERING_MAX_DEGREES,
        STEERING_MAX_DEGREES,
    )
}

/// Convert a fixed-point tenths value to its physical value
pub fn fixed_point_tenths(raw: i64) -> f64 {
    raw as f64 / 10.0
}

/// Split a GPS composite string into latitude and longitude
///
/// Exactly two tokens separated by a single space are required.
pub fn parse_gps(composite: &str) -> Option<(f64, f64)> {
    let mut tokens = composite.split(' ');
    let lat = tokens.next()?.trim().parse().ok()?;
    let lon = tokens.next()?.trim().parse().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_boundary() {
        assert_eq!(unwrap_steering(2499), 2699);
        assert_eq!(unwrap_steering(2500), -500);
        assert_eq!(unwrap_steering(0), 200);
        assert_eq!(unwrap_steering(3122), 122);
    }

    #[test]
    fn test_steering_endpoints() {
        // 2400 unwraps to 2600 (full left), 3122 unwraps to 122 (full right)
        assert!((steering_angle(2400) + 140.0).abs() < 1e-9);
        assert!((steering_angle(3122) - 140.0).abs() < 1e-9);
        // 1161 unwraps to 1361, the midpoint of the domain
        assert!(steering_angle(1161).abs() < 1e-9);
    }

    #[test]
    fn test_map_range_reversed_domain() {
        assert!((map_range(0.0, 0.0, 10.0, 0.0, 100.0) - 0.0).abs() < 1e-9);
        assert!((map_range(0.0, 10.0, 0.0, 0.0, 100.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_point_tenths() {
        assert_eq!(fixed_point_tenths(235), 23.5);
        assert_eq!(fixed_point_tenths(-5), -0.5);
        assert_eq!(fixed_point_tenths(0), 0.0);
    }

    #[test]
    fn test_parse_gps() {
        assert_eq!(parse_gps("46.207 7.620"), Some((46.207, 7.620)));
        assert_eq!(parse_gps("46.207"), None);
        assert_eq!(parse_gps("46.207 7.620 1"), None);
        assert_eq!(parse_gps("46.207  7.620"), None);
        assert_eq!(parse_gps("north 7.620"), None);
        assert_eq!(parse_gps(""), None);
    }
}
