//! # Quad filter units
//!
//! Pluggable resonant filters run on 4-wide lanes. A unit is made of a block-rate coefficient
//! function and a per-sample step function, both selected from [`QuadFilterType`] when a note
//! starts. The unit keeps its stage registers across blocks until it is re-initialised.
//!
//! An unknown type index resolves to a passthrough unit.
use std::fmt;

use nalgebra::SVector;
use numeric_literals::replace_float_literals;

use polyvoice_core::dsp::{DSPMeta, DSPProcess};
use polyvoice_core::math::{fast, one_pole_coefficient};
use polyvoice_core::Scalar;
use polyvoice_saturators::{Diode as DiodeSat, Tanh};

use crate::ladder::{LadderTopology, Ota, Transistor};

/// Available filter unit types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QuadFilterType {
    /// 4-pole OTA ladder lowpass
    Obxd,
    /// 4-pole transistor ladder lowpass
    Vintage,
    /// 2-pole lowpass with saturated bandpass feedback
    K35,
    /// 4-pole ladder built from asymmetric diode stages
    Diode,
    /// 4 one-poles whose cutoff is pushed up by the signal level
    CutoffWarp,
    /// 4 one-poles whose resonance is pulled down by the signal level
    ResonanceWarp,
}

impl QuadFilterType {
    /// All filter types, in index order.
    pub const ALL: [Self; 6] = [
        Self::Obxd,
        Self::Vintage,
        Self::K35,
        Self::Diode,
        Self::CutoffWarp,
        Self::ResonanceWarp,
    ];

    /// Decode a filter type from its index, as stored in a parameter value.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Index of this type.
    pub fn index(self) -> i32 {
        self as i32
    }

    fn coeff_fn<T: Scalar>(self) -> CoeffFn<T> {
        match self {
            Self::K35 => k35_coefficients,
            _ => ladder_coefficients,
        }
    }

    fn step_fn<T: Scalar>(self) -> StepFn<T> {
        match self {
            Self::Obxd => obxd_step,
            Self::Vintage => vintage_step,
            Self::K35 => k35_step,
            Self::Diode => diode_step,
            Self::CutoffWarp => cutoff_warp_step,
            Self::ResonanceWarp => resonance_warp_step,
        }
    }
}

/// Block-rate coefficients of a filter unit.
#[derive(Debug, Copy, Clone)]
pub struct QuadCoefficients<T> {
    /// Per-stage integrator gain, in `0..1`
    pub g: T,
    /// Feedback amount
    pub k: T,
    /// Output gain compensating the passband loss due to feedback
    pub gain: T,
}

/// Stage registers of a filter unit.
pub type QuadRegisters<T> = SVector<T, 4>;

/// Coefficient function: `(samplerate, cutoff_hz, resonance) -> coefficients`.
pub type CoeffFn<T> = fn(T, T, T) -> QuadCoefficients<T>;

/// Step function: processes one sample, updating the registers.
pub type StepFn<T> = fn(&QuadCoefficients<T>, &mut QuadRegisters<T>, T) -> T;

/// Filter unit, holding the selected coefficient and step functions and their state.
#[derive(Copy, Clone)]
pub struct QuadFilterUnit<T: Scalar> {
    coeffs: QuadCoefficients<T>,
    registers: QuadRegisters<T>,
    samplerate: T,
    kind: Option<QuadFilterType>,
    coeff_fn: CoeffFn<T>,
    step_fn: StepFn<T>,
}

impl<T: Scalar + fmt::Debug> fmt::Debug for QuadFilterUnit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadFilterUnit")
            .field("coeffs", &self.coeffs)
            .field("registers", &self.registers)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar> QuadFilterUnit<T> {
    /// Create a new filter unit of the given type; `None` creates a passthrough.
    #[replace_float_literals(T::from_f64(literal))]
    pub fn new(samplerate: T, kind: Option<QuadFilterType>) -> Self {
        let mut this = Self {
            coeffs: QuadCoefficients {
                g: 0.0,
                k: 0.0,
                gain: 1.0,
            },
            registers: SVector::zeros(),
            samplerate,
            kind: None,
            coeff_fn: ladder_coefficients,
            step_fn: passthrough_step,
        };
        this.init(kind);
        this
    }

    /// Clear the registers and select a new type.
    pub fn init(&mut self, kind: Option<QuadFilterType>) {
        self.kind = kind;
        self.registers = SVector::zeros();
        match kind {
            Some(kind) => {
                self.coeff_fn = kind.coeff_fn();
                self.step_fn = kind.step_fn();
            }
            None => {
                self.coeff_fn = ladder_coefficients;
                self.step_fn = passthrough_step;
            }
        }
    }

    /// Selected type, `None` meaning passthrough.
    pub fn kind(&self) -> Option<QuadFilterType> {
        self.kind
    }

    /// Recompute the coefficients for the given cutoff (Hz) and resonance (0..1).
    #[profiling::function]
    pub fn set_coefficients(&mut self, cutoff: T, resonance: T) {
        self.coeffs = (self.coeff_fn)(self.samplerate, cutoff, resonance);
    }

    /// Current stage registers.
    pub fn registers(&self) -> &QuadRegisters<T> {
        &self.registers
    }
}

impl<T: Scalar> DSPMeta for QuadFilterUnit<T> {
    type Sample = T;

    fn set_samplerate(&mut self, samplerate: f32) {
        self.samplerate = T::from_f64(samplerate as _);
    }

    fn reset(&mut self) {
        self.registers = SVector::zeros();
    }
}

#[profiling::all_functions]
impl<T: Scalar> DSPProcess<1, 1> for QuadFilterUnit<T> {
    #[inline(always)]
    fn process(&mut self, [x]: [Self::Sample; 1]) -> [Self::Sample; 1] {
        [(self.step_fn)(&self.coeffs, &mut self.registers, x)]
    }
}

#[replace_float_literals(T::from_f64(literal))]
fn stage_gain<T: Scalar>(samplerate: T, cutoff: T) -> T {
    let cutoff = cutoff.simd_clamp(10.0, samplerate * 0.45);
    one_pole_coefficient(samplerate, cutoff)
}

#[replace_float_literals(T::from_f64(literal))]
fn ladder_coefficients<T: Scalar>(samplerate: T, cutoff: T, resonance: T) -> QuadCoefficients<T> {
    let k = 4.0 * resonance.simd_clamp(0.0, 1.0);
    QuadCoefficients {
        g: stage_gain(samplerate, cutoff),
        k,
        gain: 1.0 + 0.5 * k,
    }
}

#[replace_float_literals(T::from_f64(literal))]
fn k35_coefficients<T: Scalar>(samplerate: T, cutoff: T, resonance: T) -> QuadCoefficients<T> {
    QuadCoefficients {
        g: stage_gain(samplerate, cutoff),
        k: 1.98 * resonance.simd_clamp(0.0, 1.0),
        gain: 1.0,
    }
}

fn passthrough_step<T: Scalar>(_: &QuadCoefficients<T>, _: &mut QuadRegisters<T>, x: T) -> T {
    x
}

fn obxd_step<T: Scalar>(c: &QuadCoefficients<T>, s: &mut QuadRegisters<T>, x: T) -> T {
    let y0 = x - c.k * fast::tanh(s[3]);
    *s = Ota(Tanh).step(c.g, y0, *s);
    s[3] * c.gain
}

fn vintage_step<T: Scalar>(c: &QuadCoefficients<T>, s: &mut QuadRegisters<T>, x: T) -> T {
    let y0 = x - c.k * s[3];
    *s = Transistor(Tanh).step(c.g, y0, *s);
    s[3] * c.gain
}

fn diode_step<T: Scalar>(c: &QuadCoefficients<T>, s: &mut QuadRegisters<T>, x: T) -> T {
    let y0 = x - c.k * fast::tanh(s[3]);
    *s = Transistor(DiodeSat).step(c.g, y0, *s);
    s[3] * c.gain
}

fn k35_step<T: Scalar>(c: &QuadCoefficients<T>, s: &mut QuadRegisters<T>, x: T) -> T {
    let (s0, s1) = (s[0], s[1]);
    let feedback = c.k * fast::tanh(s0 - s1);
    let s0 = s0 + c.g * (x - s0 + feedback);
    let s1 = s1 + c.g * (s0 - s1);
    s[0] = s0;
    s[1] = s1;
    s1
}

#[replace_float_literals(T::from_f64(literal))]
fn cutoff_warp_step<T: Scalar>(c: &QuadCoefficients<T>, s: &mut QuadRegisters<T>, x: T) -> T {
    let mut input = x - c.k * fast::tanh(s[3]);
    for i in 0..4 {
        let t = fast::tanh(input);
        let g = c.g + (1.0 - c.g) * 0.5 * t * t;
        let si = s[i];
        input = si + g * (input - si);
        s[i] = input;
    }
    s[3] * c.gain
}

#[replace_float_literals(T::from_f64(literal))]
fn resonance_warp_step<T: Scalar>(c: &QuadCoefficients<T>, s: &mut QuadRegisters<T>, x: T) -> T {
    let t = fast::tanh(x);
    let warp = 1.0 - 0.5 * t * t;
    let mut input = x - c.k * warp * fast::tanh(s[3]);
    for i in 0..4 {
        let si = s[i];
        input = si + c.g * (input - si);
        s[i] = input;
    }
    s[3] * c.gain
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvoice_core::simd::{SimdValue, WideF32x4};
    use rstest::rstest;

    const SAMPLERATE: f64 = 96_000.0;

    fn run(kind: QuadFilterType, cutoff: f64, resonance: f64, input: impl Fn(usize) -> f64) -> Vec<f64> {
        let mut unit = QuadFilterUnit::new(SAMPLERATE, Some(kind));
        unit.set_coefficients(cutoff, resonance);
        (0..20_000).map(|i| unit.process([input(i)])[0]).collect()
    }

    #[rstest]
    fn stays_finite_under_loud_input(
        #[values(
            QuadFilterType::Obxd,
            QuadFilterType::Vintage,
            QuadFilterType::K35,
            QuadFilterType::Diode,
            QuadFilterType::CutoffWarp,
            QuadFilterType::ResonanceWarp
        )]
        kind: QuadFilterType,
        #[values(0.0, 0.5, 1.0)] resonance: f64,
        #[values(50.0, 2_000.0, 40_000.0)] cutoff: f64,
    ) {
        let output = run(kind, cutoff, resonance, |i| {
            8.0 * (i as f64 * 0.013).sin().signum()
        });
        for y in output {
            assert!(y.is_finite() && y.abs() < 1e3, "{kind:?}: {y}");
        }
    }

    #[rstest]
    fn lowpass_passes_dc(
        #[values(
            QuadFilterType::Obxd,
            QuadFilterType::Vintage,
            QuadFilterType::K35,
            QuadFilterType::Diode,
            QuadFilterType::CutoffWarp,
            QuadFilterType::ResonanceWarp
        )]
        kind: QuadFilterType,
    ) {
        let output = run(kind, 1_000.0, 0.0, |_| 0.1);
        let last = output[output.len() - 1];
        assert!((last - 0.1).abs() < 1e-3, "{kind:?} DC output {last}");
    }

    #[rstest]
    fn lowpass_attenuates_highs(
        #[values(
            QuadFilterType::Obxd,
            QuadFilterType::Vintage,
            QuadFilterType::Diode,
            QuadFilterType::CutoffWarp,
            QuadFilterType::ResonanceWarp
        )]
        kind: QuadFilterType,
    ) {
        let freq = 20_000.0;
        let output = run(kind, 200.0, 0.0, |i| {
            0.1 * (std::f64::consts::TAU * freq * i as f64 / SAMPLERATE).sin()
        });
        // The diode stages are asymmetric and rectify part of the tone into DC, which the lowpass
        // keeps. Only the remaining tone is measured.
        let tail = &output[10_000..];
        let mean = tail.iter().sum::<f64>() / tail.len() as f64;
        let peak = tail.iter().fold(0.0f64, |acc, y| acc.max((y - mean).abs()));
        assert!(peak < 1e-4, "{kind:?} leaked {peak}");
    }

    #[test]
    fn unknown_type_is_passthrough() {
        let mut unit = QuadFilterUnit::new(SAMPLERATE, QuadFilterType::from_index(99));
        unit.set_coefficients(100.0, 1.0);
        assert_eq!(None, unit.kind());
        assert_eq!([0.42], unit.process([0.42]));
    }

    #[test]
    fn registers_are_cleared_on_init() {
        let mut unit = QuadFilterUnit::new(SAMPLERATE, Some(QuadFilterType::Obxd));
        unit.set_coefficients(1_000.0, 0.3);
        for _ in 0..100 {
            unit.process([1.0]);
        }
        assert!(unit.registers()[0] != 0.0);
        unit.init(Some(QuadFilterType::Vintage));
        assert_eq!(QuadRegisters::zeros(), *unit.registers());
    }

    #[test]
    fn runs_on_stereo_lanes() {
        let mut unit = QuadFilterUnit::new(WideF32x4::splat(96_000.0), Some(QuadFilterType::Obxd));
        unit.set_coefficients(WideF32x4::splat(1_000.0), WideF32x4::splat(0.2));
        let mut y = WideF32x4::splat(0.0);
        for _ in 0..20_000 {
            [y] = unit.process([WideF32x4::from_lanes(&[0.1, -0.1])]);
        }
        assert!(y.extract(0) > 0.05);
        assert!(y.extract(1) < -0.05);
        assert_eq!(0.0, y.extract(2));
    }
}
