//! # `polyvoice_core`
//!
//! Provides the basic definitions for all of `polyvoice`. Contains the sample abstraction, the DSP
//! traits, the parameter and modulation plumbing, and useful math constructs.
#![warn(missing_docs)]

extern crate self as polyvoice_core;

use simba::simd::SimdRealField;

pub use simba::simd;

pub mod dsp;
pub mod math;
pub mod parameter;
pub mod util;

/// Scalar trait. All of `polyvoice` uses this trait as bound for scalar values.
///
/// A scalar is defined here to mean the value which is used as an audio sample. It very often is
/// `f32`, but can also be any SIMD type, where each lane carries one channel of audio. Voices use
/// 4-wide lanes laid out as `[left, right, 0, 0]`.
pub trait Scalar: Copy + SimdRealField {
    /// Create a new [`Scalar`] from a single `f64` value. The resulting type, if it is a SIMD with
    /// multiple lanes, should have all lanes being this value.
    fn from_f64(value: f64) -> Self;

    /// Create a new [`Scalar`] from the given lane values. Lanes not covered by `values` are set
    /// to zero.
    fn from_lanes(values: &[Self::Element]) -> Self;
}

impl<T: Copy + SimdRealField> Scalar for T
where
    T::Element: Copy,
{
    fn from_f64(value: f64) -> Self {
        Self::from_subset(&value)
    }

    fn from_lanes(values: &[Self::Element]) -> Self {
        let mut ret = Self::zero();
        for (i, value) in values.iter().copied().enumerate().take(Self::LANES) {
            ret.replace(i, value);
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simba::simd::SimdValue;

    const fn is_compatible<T: Scalar>() {}

    #[test]
    fn test_type_compatibility() {
        is_compatible::<f32>();
        is_compatible::<f64>();
        is_compatible::<simd::WideF32x4>();
    }

    #[test]
    fn from_lanes_fills_missing_lanes_with_zero() {
        let x = simd::WideF32x4::from_lanes(&[1.0, 2.0]);
        assert_eq!(
            [1.0, 2.0, 0.0, 0.0],
            [x.extract(0), x.extract(1), x.extract(2), x.extract(3)]
        );
    }

    #[test]
    fn from_lanes_on_scalars_takes_first_value() {
        assert_eq!(3.0, f32::from_lanes(&[3.0, 4.0]));
    }
}
