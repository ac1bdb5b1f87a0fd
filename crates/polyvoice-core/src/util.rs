//! Utilities for all of `polyvoice`.
use numeric_literals::replace_float_literals;

use crate::Scalar;

/// Shortcut function to perform linear interpolation, returning `a` at `t = 0` and `b` at `t = 1`.
pub fn lerp<T: Scalar>(t: T, a: T, b: T) -> T {
    a + (b - a) * t
}

/// Computes the frequency of a (possibly fractional) MIDI note number, assuming 12TET and
/// A4 = 440 Hz.
///
/// # Arguments
///
/// * `midi_note`: MIDI note number
///
/// returns: T
#[replace_float_literals(T::from_f64(literal))]
pub fn midi_to_freq<T: Scalar>(midi_note: T) -> T {
    440.0 * semitone_to_ratio(midi_note - 69.0)
}

/// Compute the ratio corresponding to the given semitone change, such that multiplying a frequency
/// by this value changes it by the given semitones.
///
/// # Arguments
///
/// * `semi`: Semitone change
///
/// returns: T
#[replace_float_literals(T::from_f64(literal))]
pub fn semitone_to_ratio<T: Scalar>(semi: T) -> T {
    2.0.simd_powf(semi / 12.0)
}

/// Convert a gain in decibels into a linear gain.
#[replace_float_literals(T::from_f64(literal))]
pub fn db_to_linear<T: Scalar>(db: T) -> T {
    10.0.simd_powf(db / 20.0)
}

/// Absolute value that is unambiguous for both scalar and SIMD types.
#[inline]
pub fn abs<T: Scalar>(x: T) -> T {
    x.simd_max(-x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(69.0, 440.0)]
    #[case(81.0, 880.0)]
    #[case(57.0, 220.0)]
    fn test_midi_to_freq(#[case] note: f64, #[case] expected: f64) {
        assert!((midi_to_freq(note) - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(-6.0, 0.501_187_233_6)]
    #[case(20.0, 10.0)]
    fn test_db_to_linear(#[case] db: f64, #[case] expected: f64) {
        assert!((db_to_linear(db) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(2.5, lerp(0.25, 2.0, 4.0));
    }

    #[test]
    fn test_abs() {
        assert_eq!(3.0, abs(-3.0f32));
        assert_eq!(3.0, abs(3.0f32));
    }
}
