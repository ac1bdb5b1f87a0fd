//! PolyBLEP band-limited oscillators.
//!
//! A naive waveform is evaluated from the phasor, and each of its discontinuities is smoothed by
//! a 2-sample polynomial residual.
use std::marker::PhantomData;

use numeric_literals::replace_float_literals;

use polyvoice_core::dsp::{DSPMeta, DSPProcess};
use polyvoice_core::simd::SimdBool;
use polyvoice_core::util::lerp;
use polyvoice_core::Scalar;

use crate::Phasor;

/// Polynomial band-limited step, placed at a phase offset within the period.
#[derive(Debug, Copy, Clone)]
pub struct PolyBLEP<T> {
    /// Half of the step height, signed
    pub amplitude: T,
    /// Phase offset such that the discontinuity sits at `phase + offset == 0 (mod 1)`
    pub phase: T,
}

impl<T: Scalar> PolyBLEP<T> {
    /// Evaluate the residual at the given phase, with `dt` the phase increment per sample.
    #[replace_float_literals(T::from_f64(literal))]
    pub fn eval(&self, dt: T, phase: T) -> T {
        let t = T::simd_fract(phase + self.phase);
        let ret = t.simd_lt(dt).if_else(
            || {
                let t = t / dt;
                t + t - t * t - 1.0
            },
            || {
                t.simd_gt(1.0 - dt).if_else(
                    || {
                        let t = (t - 1.0) / dt;
                        t * t + t + t + 1.0
                    },
                    T::zero,
                )
            },
        );
        self.amplitude * ret
    }
}

/// Waveform definition for [`PolyBLEPDriver`].
pub trait PolyBLEPOscillator: DSPMeta {
    /// Discontinuities of the waveform.
    fn bleps(&self) -> impl IntoIterator<Item = PolyBLEP<Self::Sample>>;

    /// Evaluate the naive (aliasing) waveform at the given phase.
    fn naive_eval(&mut self, phase: Self::Sample) -> Self::Sample;
}

/// Drives a [`PolyBLEPOscillator`] from a [`Phasor`].
#[derive(Debug, Clone, Copy)]
pub struct PolyBLEPDriver<Osc: PolyBLEPOscillator> {
    /// Phase accumulator
    pub phasor: Phasor<Osc::Sample>,
    /// Waveform
    pub blep: Osc,
}

impl<Osc: PolyBLEPOscillator> PolyBLEPDriver<Osc> {
    /// Create a new oscillator.
    pub fn new(samplerate: Osc::Sample, frequency: Osc::Sample, blep: Osc) -> Self {
        Self {
            phasor: Phasor::new(samplerate, frequency),
            blep,
        }
    }

    /// Set the oscillator frequency, in Hz.
    pub fn set_frequency(&mut self, frequency: Osc::Sample) {
        self.phasor.set_frequency(frequency);
    }
}

impl<Osc: PolyBLEPOscillator> DSPMeta for PolyBLEPDriver<Osc> {
    type Sample = Osc::Sample;

    fn set_samplerate(&mut self, samplerate: f32) {
        self.phasor.set_samplerate(samplerate);
        self.blep.set_samplerate(samplerate);
    }

    fn latency(&self) -> usize {
        self.blep.latency()
    }

    fn reset(&mut self) {
        self.phasor.reset();
        self.blep.reset();
    }
}

#[profiling::all_functions]
impl<Osc: PolyBLEPOscillator> DSPProcess<0, 1> for PolyBLEPDriver<Osc> {
    fn process(&mut self, _: [Self::Sample; 0]) -> [Self::Sample; 1] {
        let step = self.phasor.step();
        let [phase] = self.phasor.process([]);
        let mut y = self.blep.naive_eval(phase);
        for blep in self.blep.bleps() {
            y += blep.eval(step, phase);
        }
        [y]
    }
}

/// Rising sawtooth, falling at the period boundary.
#[derive(Debug, Copy, Clone)]
pub struct SawBLEP<T>(PhantomData<T>);

impl<T> Default for SawBLEP<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> DSPMeta for SawBLEP<T> {
    type Sample = T;
}

impl<T: Scalar> PolyBLEPOscillator for SawBLEP<T> {
    fn bleps(&self) -> impl IntoIterator<Item = PolyBLEP<Self::Sample>> {
        [PolyBLEP {
            amplitude: -T::one(),
            phase: T::zero(),
        }]
    }

    #[replace_float_literals(T::from_f64(literal))]
    fn naive_eval(&mut self, phase: Self::Sample) -> Self::Sample {
        2.0 * phase - 1.0
    }
}

/// Band-limited sawtooth oscillator.
pub type Sawtooth<T> = PolyBLEPDriver<SawBLEP<T>>;

/// Pulse wave with variable width, with its DC offset removed.
///
/// The output is low for the first `width` of the period, and high for the rest.
#[derive(Debug, Copy, Clone)]
pub struct PulseBLEP<T> {
    pw: T,
}

impl<T: Scalar> PulseBLEP<T> {
    /// Create a new pulse waveform with the given width, clamped into `0.01..0.99`.
    pub fn new(pulse_width: T) -> Self {
        Self {
            pw: clamp_width(pulse_width),
        }
    }

    /// Change the pulse width, clamped into `0.01..0.99`.
    pub fn set_pulse_width(&mut self, pw: T) {
        self.pw = clamp_width(pw);
    }
}

#[replace_float_literals(T::from_f64(literal))]
fn clamp_width<T: Scalar>(pw: T) -> T {
    pw.simd_clamp(0.01, 0.99)
}

impl<T: Scalar> DSPMeta for PulseBLEP<T> {
    type Sample = T;
}

impl<T: Scalar> PolyBLEPOscillator for PulseBLEP<T> {
    fn bleps(&self) -> impl IntoIterator<Item = PolyBLEP<Self::Sample>> {
        [
            PolyBLEP {
                amplitude: -T::one(),
                phase: T::zero(),
            },
            PolyBLEP {
                amplitude: T::one(),
                phase: T::one() - self.pw,
            },
        ]
    }

    fn naive_eval(&mut self, phase: Self::Sample) -> Self::Sample {
        let dc_offset = lerp(self.pw, -T::one(), T::one());
        phase.simd_ge(self.pw).if_else(T::one, || -T::one()) + dc_offset
    }
}

/// Band-limited pulse oscillator.
pub type Pulse<T> = PolyBLEPDriver<PulseBLEP<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mean_and_peak<Osc: PolyBLEPOscillator<Sample = f64>>(
        mut osc: PolyBLEPDriver<Osc>,
    ) -> (f64, f64) {
        let n = 48_000;
        let mut sum = 0.0;
        let mut peak = 0.0f64;
        for _ in 0..n {
            let [y] = osc.process([]);
            sum += y;
            peak = peak.max(y.abs());
        }
        (sum / n as f64, peak)
    }

    #[test]
    fn sawtooth_is_centered() {
        let saw = Sawtooth::new(48_000.0, 440.0, SawBLEP::default());
        let (mean, peak) = mean_and_peak(saw);
        assert!(mean.abs() < 1e-2, "mean {mean}");
        assert!(peak <= 1.0 + 1e-9, "peak {peak}");
    }

    #[rstest]
    fn pulse_has_no_dc(#[values(0.1, 0.5, 0.8)] width: f64) {
        let pulse = Pulse::new(48_000.0, 300.0, PulseBLEP::new(width));
        let (mean, peak) = mean_and_peak(pulse);
        assert!(mean.abs() < 2e-2, "mean {mean}");
        assert!(peak <= 2.0, "peak {peak}");
    }

    #[test]
    fn blep_smooths_the_saw_reset() {
        let mut saw = Sawtooth::new(1000.0f64, 100.0, SawBLEP::default());
        let out: Vec<f64> = (0..20).map(|_| saw.process([])[0]).collect();
        for w in out.windows(2) {
            let jump = (w[1] - w[0]).abs();
            assert!(jump < 1.5, "jump of {jump}");
        }
    }

    #[test]
    fn pulse_width_is_clamped() {
        let mut blep = PulseBLEP::new(0.5f64);
        blep.set_pulse_width(3.0);
        assert_eq!(0.99, blep.pw);
    }
}
