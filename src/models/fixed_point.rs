use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StatsError};
use crate::utils::constants::FIXED_POINT_SCALE;

/// A temperature reading scaled by [`FIXED_POINT_SCALE`] and rounded to the
/// nearest integer, so that device kernels can reduce it with integer atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPoint(i32);

impl FixedPoint {
    /// Padding marker. `encode` never yields this value, so it cannot collide
    /// with a real reading.
    pub const SENTINEL: FixedPoint = FixedPoint(i32::MIN);

    pub const ZERO: FixedPoint = FixedPoint(0);

    /// Scale a decimal reading and round half away from zero.
    pub fn encode(reading: f64) -> Result<Self> {
        if !reading.is_finite() {
            return Err(StatsError::InvalidReading(format!(
                "{} is not a finite number",
                reading
            )));
        }

        let scaled = (reading * FIXED_POINT_SCALE as f64).round();
        if scaled <= i32::MIN as f64 || scaled > i32::MAX as f64 {
            return Err(StatsError::InvalidReading(format!(
                "{} is outside the representable fixed-point range",
                reading
            )));
        }

        Ok(Self(scaled as i32))
    }

    pub fn decode(self) -> f64 {
        self.0 as f64 / FIXED_POINT_SCALE as f64
    }

    /// Decode a wide accumulator that is still at single scale (e.g. a sum).
    pub fn decode_raw(raw: i64) -> f64 {
        raw as f64 / FIXED_POINT_SCALE as f64
    }

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }
}

impl FromStr for FixedPoint {
    type Err = StatsError;

    fn from_str(token: &str) -> Result<Self> {
        let reading = token
            .trim()
            .parse::<f64>()
            .map_err(|e| StatsError::InvalidReading(format!("'{}': {}", token, e)))?;
        Self::encode(reading)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.decode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_rounds_to_nearest() {
        assert_eq!(FixedPoint::encode(12.5).unwrap().raw(), 1250);
        assert_eq!(FixedPoint::encode(-3.456).unwrap().raw(), -346);
        assert_eq!(FixedPoint::encode(0.004).unwrap().raw(), 0);
        assert_eq!(FixedPoint::encode(-0.006).unwrap().raw(), -1);
    }

    #[test]
    fn test_decode_restores_stated_precision() {
        for reading in [10.0, -7.25, 0.01, 23.45, -15.9] {
            let decoded = FixedPoint::encode(reading).unwrap().decode();
            assert!((decoded - reading).abs() < 1e-9, "{} -> {}", reading, decoded);
        }

        let truncated = FixedPoint::encode(9.876).unwrap().decode();
        assert!((truncated - 9.88).abs() < 1e-9);
    }

    #[test]
    fn test_encode_rejects_unrepresentable() {
        assert!(FixedPoint::encode(f64::NAN).is_err());
        assert!(FixedPoint::encode(f64::INFINITY).is_err());
        assert!(FixedPoint::encode(1e12).is_err());
        assert!(FixedPoint::encode(i32::MIN as f64 / 100.0).is_err());
    }

    #[test]
    fn test_sentinel_is_never_encoded() {
        let lowest = FixedPoint::encode((i32::MIN as f64 + 1.0) / 100.0).unwrap();
        assert!(!lowest.is_sentinel());
        assert!(lowest > FixedPoint::SENTINEL);
    }

    #[test]
    fn test_parse_token() {
        let value: FixedPoint = " 4.7 ".parse().unwrap();
        assert_eq!(value.raw(), 470);
        assert!("abc".parse::<FixedPoint>().is_err());
        assert_eq!(value.to_string(), "4.70");
    }

    #[test]
    fn test_decode_raw_sum() {
        assert_eq!(FixedPoint::decode_raw(600_000_000_000), 6_000_000_000.0);
    }
}
