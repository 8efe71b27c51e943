// src/utils/color.rs
//! Deterministic branding colors.
//!
//! Credentials without a resolvable bundle still need a stable card color, so a
//! color is derived from a seed string (credential name, issuer or credential
//! definition id). Colors must match the ones wallets already display, so the
//! hash works on UTF-16 code units and truncates only the shift to 32 bits.

use rand::{Error as RandError, RngCore, SeedableRng};

/// Upper bound (exclusive) of a single color channel.
const COLOR_RANGE_UPPER_BOUND: f64 = 256.0;

/// Mulberry32 increment constant.
const MULBERRY_INCREMENT: u32 = 0x6d2b_79f5;

/// Computes the numerical hash of a seed string.
///
/// Folds over UTF-16 code units with `h = c + ((int32(h) << 5) - h)`. Only the
/// shift is truncated to 32 bits, so the accumulator can leave the `i32` range;
/// `i64` keeps it exact for any realistic input.
///
/// # Arguments
/// * `seed` - Arbitrary seed string
///
/// # Returns
/// Signed hash value, identical across runs and platforms
pub fn hash_code(seed: &str) -> i64 {
    seed.encode_utf16().fold(0i64, |hash, unit| {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        i64::from(unit) + (shifted - hash)
    })
}

/// Small seeded pseudo-random generator (Mulberry32).
///
/// A fresh generator seeded with `hash + channel` is used for every color
/// channel, so only the first output of each generator matters for colors. The
/// generator still implements [`RngCore`] so it can be used as a regular RNG.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Seeds the generator from a (possibly out of `u32` range) hash value.
    ///
    /// Only the low 32 bits of the seed take part, matching `ToUint32`.
    pub fn from_hash(seed: i64) -> Self {
        Self { state: seed as u32 }
    }

    /// Returns the next value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

impl SeedableRng for Mulberry32 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            state: u32::from_le_bytes(seed),
        }
    }
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let t = self.state as i32;
        let t = (t ^ ((self.state >> 15) as i32)).wrapping_mul(t | 1);
        let t = t ^ t.wrapping_add((t ^ (((t as u32) >> 7) as i32)).wrapping_mul(t | 61));
        (t ^ (((t as u32) >> 14) as i32)) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next_u32());
        let low = u64::from(self.next_u32());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Converts a numerical hash into a `#rrggbb` color string.
///
/// Each channel is drawn from the lower half of the range so generated card
/// backgrounds stay dark enough for light text.
///
/// # Arguments
/// * `hash` - Value produced by [`hash_code`]
///
/// # Returns
/// Lowercase hex color, e.g. `#32d3cc`
pub fn hash_to_rgba(hash: i64) -> String {
    let mut color = String::from("#");
    for channel in 0..3 {
        let unit = Mulberry32::from_hash(hash + channel).next_unit();
        let value = ((unit * COLOR_RANGE_UPPER_BOUND) / 2.0).floor() as u8;
        color.push_str(&format!("{:02x}", value));
    }
    color
}

/// Derives the stable branding color for a seed string.
pub fn generate_color(seed: &str) -> String {
    hash_to_rgba(hash_code(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_code_matches_reference_values() {
        assert_eq!(hash_code(""), 0);
        assert_eq!(hash_code("default"), 1_544_803_905);
        assert_eq!(hash_code("Student Card"), 85_909_013);
        // Accumulator leaves the i32 range for these
        assert_eq!(hash_code("Unknown Contact"), -7_297_445_366);
        assert_eq!(
            hash_code("Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:default"),
            17_287_333_604
        );
        assert_eq!(hash_code("Épreuve ✓"), -3_795_408_163);
    }

    #[test]
    fn test_generate_color_matches_reference_values() {
        assert_eq!(generate_color(""), "#22505d");
        assert_eq!(generate_color("default"), "#53386d");
        assert_eq!(generate_color("Student Card"), "#602809");
        assert_eq!(generate_color("Unknown Contact"), "#024b2c");
        assert_eq!(generate_color("Employee ID Card"), "#213817");
        assert_eq!(
            generate_color("Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:default"),
            "#2e1d04"
        );
        assert_eq!(
            generate_color(
                "a much longer credential name that should overflow the thirty two bit range many times over"
            ),
            "#4c6275"
        );
    }

    #[test]
    fn test_generate_color_is_stable_across_calls() {
        let first = generate_color("Employee ID Card");
        for _ in 0..10 {
            assert_eq!(generate_color("Employee ID Card"), first);
        }
    }

    #[test]
    fn test_channels_stay_in_darker_half() {
        for seed in ["a", "b", "c", "Membership", "did:indy:sovrin:abc"] {
            let color = generate_color(seed);
            assert_eq!(color.len(), 7);
            for channel in 0..3 {
                let hex = &color[1 + channel * 2..3 + channel * 2];
                let value = u8::from_str_radix(hex, 16).unwrap();
                assert!(value < 128, "{} has bright channel {}", color, hex);
            }
        }
    }

    #[test]
    fn test_seedable_rng_matches_hash_seeding() {
        let mut from_hash = Mulberry32::from_hash(-1);
        let mut from_seed = Mulberry32::from_seed(u32::MAX.to_le_bytes());
        assert_eq!(from_hash.next_u32(), from_seed.next_u32());
        assert_eq!(from_hash.next_u64(), from_seed.next_u64());

        let mut bytes = [0u8; 7];
        from_hash.fill_bytes(&mut bytes);
        let mut expected = [0u8; 7];
        from_seed.try_fill_bytes(&mut expected).unwrap();
        assert_eq!(bytes, expected);
    }
}
