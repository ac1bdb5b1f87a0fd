//! Math helpers shared by the DSP crates.
use numeric_literals::replace_float_literals;

use crate::Scalar;

pub mod fast;

/// Coefficient of a one-pole lowpass discretized with the impulse-invariant method, such that
/// `y += g * (x - y)` has its -3 dB point at `fc`. Always within `0..1`, which keeps explicit
/// integrators stable up to the Nyquist frequency.
#[replace_float_literals(T::from_f64(literal))]
pub fn one_pole_coefficient<T: Scalar>(samplerate: T, fc: T) -> T {
    1.0 - (-T::simd_two_pi() * fc / samplerate).simd_exp()
}

/// Prewarped integrator gain `tan(pi * fc / samplerate)` for trapezoidal-integrated filters.
pub fn prewarp<T: Scalar>(samplerate: T, fc: T) -> T {
    (T::simd_pi() * fc / samplerate).simd_tan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pole_coefficient_is_bounded() {
        for fc in [1.0, 100.0, 10_000.0, 23_999.0] {
            let g = one_pole_coefficient(48_000.0f64, fc);
            assert!(g > 0.0 && g < 1.0, "g = {g} at fc = {fc}");
        }
    }

    #[test]
    fn prewarp_at_quarter_nyquist() {
        let g = prewarp(48_000.0f64, 6_000.0);
        assert!((g - (std::f64::consts::PI / 8.0).tan()).abs() < 1e-12);
    }
}
