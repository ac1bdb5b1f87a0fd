//! Trapezoidal-integrated state variable filter, after Andrew Simper's "Linear Trap Optimised
//! SVF" derivation (Cytomic technical papers).
//!
//! All six outputs are derived from the same two integrator states; the mode only selects which
//! combination is returned. The combination is resolved once into a [`TapFn`] when the mode is set,
//! and coefficients are recomputed at block rate through [`Svf::set_coefficients`].
use std::fmt;

use numeric_literals::replace_float_literals;

use polyvoice_core::dsp::{DSPMeta, DSPProcess};
use polyvoice_core::math::prewarp;
use polyvoice_core::Scalar;

/// Lowest cutoff frequency accepted by the filter (Hz).
pub const MIN_CUTOFF: f64 = 10.0;
/// Highest cutoff frequency accepted by the filter (Hz), further limited to below Nyquist.
pub const MAX_CUTOFF: f64 = 25_000.0;
/// Resonance range accepted by the filter.
pub const RESONANCE_RANGE: (f64, f64) = (0.01, 0.99);

/// Output mode of the state variable filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SvfMode {
    /// Low-pass output
    Lowpass,
    /// High-pass output
    Highpass,
    /// Band-pass output
    Bandpass,
    /// Notch (low-pass + high-pass)
    Notch,
    /// Peak (low-pass - high-pass)
    Peak,
    /// All-pass
    Allpass,
}

impl SvfMode {
    /// All modes, in index order.
    pub const ALL: [Self; 6] = [
        Self::Lowpass,
        Self::Highpass,
        Self::Bandpass,
        Self::Notch,
        Self::Peak,
        Self::Allpass,
    ];

    /// Decode a mode from its index, as stored in a parameter value.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Index of this mode.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Resolve the output combination for this mode.
    pub fn tap_fn<T: Scalar>(self) -> TapFn<T> {
        match self {
            Self::Lowpass => |t| t.lp,
            Self::Highpass => |t| t.hp,
            Self::Bandpass => |t| t.bp,
            Self::Notch => |t| t.lp + t.hp,
            Self::Peak => |t| t.lp - t.hp,
            Self::Allpass => |t| t.lp + t.hp - t.k * t.bp,
        }
    }
}

/// Simultaneous outputs of one filter step.
#[derive(Debug, Copy, Clone)]
pub struct SvfTaps<T> {
    /// Input sample
    pub input: T,
    /// Low-pass output
    pub lp: T,
    /// Band-pass output
    pub bp: T,
    /// High-pass output
    pub hp: T,
    /// Damping coefficient, needed for the all-pass combination
    pub k: T,
}

/// Function selecting the reported output out of the simultaneous taps.
pub type TapFn<T> = fn(&SvfTaps<T>) -> T;

/// Block-rate coefficients of the filter.
#[derive(Debug, Copy, Clone)]
pub struct SvfCoefficients<T> {
    a1: T,
    a2: T,
    a3: T,
    ak: T,
    k: T,
}

impl<T: Scalar> SvfCoefficients<T> {
    /// Compute the coefficients for the given cutoff (Hz) and resonance (0..1). Both are clamped
    /// into the stable range.
    #[replace_float_literals(T::from_f64(literal))]
    pub fn new(samplerate: T, cutoff: T, resonance: T) -> Self {
        let max_cutoff = (samplerate * 0.49).simd_min(T::from_f64(MAX_CUTOFF));
        let cutoff = cutoff.simd_clamp(T::from_f64(MIN_CUTOFF), max_cutoff);
        let resonance = resonance.simd_clamp(
            T::from_f64(RESONANCE_RANGE.0),
            T::from_f64(RESONANCE_RANGE.1),
        );
        let g = prewarp(samplerate, cutoff);
        let k = 2.0 - 2.0 * resonance;
        let gk = g + k;
        let a1 = (1.0 + g * gk).simd_recip();
        let a2 = g * a1;
        let a3 = g * a2;
        let ak = gk * a1;
        Self { a1, a2, a3, ak, k }
    }
}

/// State variable filter. Lanes of `T` are independent channels sharing the same coefficients.
#[derive(Copy, Clone)]
pub struct Svf<T> {
    ic1: T,
    ic2: T,
    coeffs: SvfCoefficients<T>,
    samplerate: T,
    mode: Option<SvfMode>,
    tap: TapFn<T>,
}

impl<T: fmt::Debug> fmt::Debug for Svf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Svf")
            .field("ic1", &self.ic1)
            .field("ic2", &self.ic2)
            .field("coeffs", &self.coeffs)
            .field("samplerate", &self.samplerate)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar> Svf<T> {
    /// Create a new filter. A `None` mode makes the filter pass its input through unprocessed.
    #[replace_float_literals(T::from_f64(literal))]
    pub fn new(samplerate: T, mode: Option<SvfMode>) -> Self {
        let mut this = Self {
            ic1: 0.0,
            ic2: 0.0,
            coeffs: SvfCoefficients::new(samplerate, 1000.0, 0.0),
            samplerate,
            mode: None,
            tap: |t| t.input,
        };
        this.set_mode(mode);
        this
    }

    /// Select the output mode. This does not touch the coefficients or the integrator states.
    pub fn set_mode(&mut self, mode: Option<SvfMode>) {
        self.mode = mode;
        self.tap = match mode {
            Some(mode) => mode.tap_fn(),
            None => |t| t.input,
        };
    }

    /// Recompute the coefficients for the given cutoff (Hz) and resonance (0..1).
    #[profiling::function]
    pub fn set_coefficients(&mut self, cutoff: T, resonance: T) {
        self.coeffs = SvfCoefficients::new(self.samplerate, cutoff, resonance);
    }

    /// Run one step of the filter, returning all outputs.
    #[inline(always)]
    #[replace_float_literals(T::from_f64(literal))]
    pub fn process_taps(&mut self, x: T) -> SvfTaps<T> {
        let SvfCoefficients { a1, a2, a3, ak, k } = self.coeffs;
        let v3 = x - self.ic2;
        let v0 = a1 * v3 - ak * self.ic1;
        let v1 = a2 * v3 + a1 * self.ic1;
        let v2 = a3 * v3 + a2 * self.ic1 + self.ic2;
        self.ic1 = 2.0 * v1 - self.ic1;
        self.ic2 = 2.0 * v2 - self.ic2;
        SvfTaps {
            input: x,
            lp: v2,
            bp: v1,
            hp: v0,
            k,
        }
    }
}

impl<T: Scalar> DSPMeta for Svf<T> {
    type Sample = T;

    fn set_samplerate(&mut self, samplerate: f32) {
        self.samplerate = T::from_f64(samplerate as _);
    }

    fn reset(&mut self) {
        self.ic1 = T::zero();
        self.ic2 = T::zero();
    }
}

#[profiling::all_functions]
impl<T: Scalar> DSPProcess<1, 1> for Svf<T> {
    #[inline(always)]
    fn process(&mut self, [x]: [Self::Sample; 1]) -> [Self::Sample; 1] {
        let taps = self.process_taps(x);
        [(self.tap)(&taps)]
    }
}
