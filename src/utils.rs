/// Utility functions for scale mapping and timestamp formatting
use time::{format_description, OffsetDateTime};

use crate::error::HwError;

/// Linearly map `value` from the input range onto the output range
///
/// Pure interpolation: `out_min + (value - in_min) * (out_max - out_min) /
/// (in_max - in_min)`. An empty input range would divide by zero, so it is
/// rejected explicitly instead of letting NaN/Inf escape into the threshold
/// decision.
///
/// # Arguments
/// * `value` - The value to map, expressed on the input scale
/// * `in_min`, `in_max` - Bounds of the input scale
/// * `out_min`, `out_max` - Bounds of the output scale
///
/// # Returns
/// The mapped value, or `DegenerateRange` when `in_max == in_min`
pub fn map_to_scale(
    value: f64,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
) -> Result<f64, HwError> {
    if in_max == in_min {
        return Err(HwError::DegenerateRange(in_min));
    }
    Ok((value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min)
}

/// Timestamp for image filenames: day-month-year-hour-minute-second with no
/// separators, e.g. `29082026143015`.
///
/// Uses local time when the offset is available, UTC otherwise.
pub fn image_timestamp() -> String {
    let format = format_description::parse("[day][month][year][hour][minute][second]")
        .expect("Failed to create format description");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_covers_adc_range_monotonically() {
        let mut previous = -1.0;
        for raw in 0u16..=255 {
            let pct = map_to_scale(raw as f64, 0.0, 255.0, 0.0, 100.0).unwrap();
            assert!((0.0..=100.0).contains(&pct), "out of bounds at raw={}", raw);
            assert!(pct >= previous, "not monotonic at raw={}", raw);
            previous = pct;
        }
    }

    #[test]
    fn map_hits_scale_endpoints() {
        assert_eq!(map_to_scale(0.0, 0.0, 255.0, 0.0, 100.0).unwrap(), 0.0);
        assert_eq!(map_to_scale(255.0, 0.0, 255.0, 0.0, 100.0).unwrap(), 100.0);
    }

    #[test]
    fn degenerate_range_is_an_error_not_nan() {
        let result = map_to_scale(42.0, 7.0, 7.0, 0.0, 100.0);
        match result {
            Err(HwError::DegenerateRange(bound)) => assert_eq!(bound, 7.0),
            other => panic!("expected DegenerateRange, got {:?}", other),
        }
    }

    #[test]
    fn truncated_average_maps_below_threshold() {
        // The averaged raw value 11 corresponds to roughly 4.3%
        let pct = map_to_scale(11.0, 0.0, 255.0, 0.0, 100.0).unwrap();
        assert!((pct - 4.31).abs() < 0.01);
        assert!(pct < 30.0);
    }

    #[test]
    fn image_timestamp_is_fourteen_digits() {
        let stamp = image_timestamp();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }
}
