//! Coordinate rounding, geohashing and place-name overlap.

use std::collections::BTreeSet;

use crate::models::SavedLocation;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Rounds to `decimals` places. Three decimals is roughly 110 m.
pub fn round_coordinate(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Standard base32 geohash of the given precision.
pub fn geohash(latitude: f64, longitude: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut bit = 0;
    let mut idx = 0usize;

    while hash.len() < precision {
        let (range, value) = if even_bit {
            (&mut lng_range, longitude)
        } else {
            (&mut lat_range, latitude)
        };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            idx = idx * 2 + 1;
            range.0 = mid;
        } else {
            idx *= 2;
            range.1 = mid;
        }
        even_bit = !even_bit;

        bit += 1;
        if bit == 5 {
            hash.push(BASE32[idx] as char);
            bit = 0;
            idx = 0;
        }
    }

    hash
}

/// Names saved by both users, sorted. Geohashes are not consulted.
pub fn shared_location_names(mine: &[SavedLocation], theirs: &[SavedLocation]) -> Vec<String> {
    let mine: BTreeSet<&str> = mine.iter().map(|l| l.name.as_str()).collect();
    let theirs: BTreeSet<&str> = theirs.iter().map(|l| l.name.as_str()).collect();
    mine.intersection(&theirs).map(|n| n.to_string()).collect()
}

/// Discovery tier from the shared-location count: 1 is best.
pub fn tier_for(shared: usize) -> u8 {
    match shared {
        n if n >= 3 => 1,
        n if n >= 1 => 2,
        _ => 3,
    }
}
