//! Geohash cache keys.
//!
//! Standard geohash: longitude and latitude bisections interleaved (longitude
//! first), five bits per base-32 character.  The key keeps the raw bits and
//! the precision, so two keys compare equal only when both match.

use std::fmt;

use rt_core::{BoundingBox, GeoPoint};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported geohash, in characters (60 bits).
pub const MAX_PRECISION: u8 = 12;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geohash {
    bits: u64,
    precision: u8,
}

impl Geohash {
    /// Encode `point` at `precision` characters (clamped to 1..=12).
    /// Out-of-range coordinates are clamped onto the globe.
    pub fn encode(point: GeoPoint, precision: u8) -> Self {
        let precision = precision.clamp(1, MAX_PRECISION);
        let lat = point.lat.clamp(-90.0, 90.0);
        let lon = point.lon.clamp(-180.0, 180.0);

        let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
        let (mut lon_lo, mut lon_hi) = (-180.0_f64, 180.0_f64);
        let mut bits = 0u64;

        for i in 0..precision as u32 * 5 {
            bits <<= 1;
            if i % 2 == 0 {
                let mid = (lon_lo + lon_hi) * 0.5;
                if lon >= mid {
                    bits |= 1;
                    lon_lo = mid;
                } else {
                    lon_hi = mid;
                }
            } else {
                let mid = (lat_lo + lat_hi) * 0.5;
                if lat >= mid {
                    bits |= 1;
                    lat_lo = mid;
                } else {
                    lat_hi = mid;
                }
            }
        }
        Self { bits, precision }
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// The cell this hash denotes.
    pub fn bounds(&self) -> BoundingBox {
        let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
        let (mut lon_lo, mut lon_hi) = (-180.0_f64, 180.0_f64);
        let total = self.precision as u32 * 5;
        for i in 0..total {
            let bit = (self.bits >> (total - 1 - i)) & 1 == 1;
            if i % 2 == 0 {
                let mid = (lon_lo + lon_hi) * 0.5;
                if bit { lon_lo = mid } else { lon_hi = mid }
            } else {
                let mid = (lat_lo + lat_hi) * 0.5;
                if bit { lat_lo = mid } else { lat_hi = mid }
            }
        }
        BoundingBox::new(lat_lo, lon_lo, lat_hi, lon_hi)
    }
}

impl fmt::Display for Geohash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in (0..self.precision as u32).rev() {
            let idx = (self.bits >> (c * 5)) & 0x1f;
            write!(f, "{}", BASE32[idx as usize] as char)?;
        }
        Ok(())
    }
}
