//! Fast approximations of transcendental functions.
use numeric_literals::replace_float_literals;

use crate::Scalar;

/// Rational approximation of tanh(x) which is valid in the range -3..3
///
/// This approximation only includes the rational approximation part, and will diverge outside the
/// bounds. In order to apply the tanh function over a bigger interval, consider clamping either the
/// input or the output.
///
/// Source: <https://www.musicdsp.org/en/latest/Other/238-rational-tanh-approximation.html>
#[replace_float_literals(T::from_f64(literal))]
pub fn rational_tanh<T: Scalar>(x: T) -> T {
    x * (27. + x * x) / (27. + 9. * x * x)
}

/// Fast approximation of tanh(x), clamping the output of [`rational_tanh`] to -1..1.
pub fn tanh<T: Scalar>(x: T) -> T {
    rational_tanh(x.simd_clamp(-T::from_f64(3.0), T::from_f64(3.0)))
}
