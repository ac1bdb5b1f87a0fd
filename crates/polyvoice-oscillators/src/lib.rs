//! # Oscillators
//!
//! Sound and modulation sources of a voice: band-limited sawtooth and pulse, sine, correlated
//! noise, and the block-rate LFO. Unison geometry for stacked sawtooths lives in [`unison`].
use numeric_literals::replace_float_literals;

use polyvoice_core::dsp::{DSPMeta, DSPProcess};
use polyvoice_core::Scalar;

pub mod lfo;
pub mod noise;
pub mod polyblep;
pub mod sine;
pub mod unison;

/// Normalized phase accumulator, wrapping in `0..1`.
#[derive(Debug, Clone, Copy)]
pub struct Phasor<T> {
    phase: T,
    step: T,
    samplerate: T,
}

impl<T: Scalar> DSPMeta for Phasor<T> {
    type Sample = T;

    fn set_samplerate(&mut self, samplerate: f32) {
        let freq = self.step * self.samplerate;
        self.samplerate = T::from_f64(samplerate as _);
        self.step = freq / self.samplerate;
    }

    fn reset(&mut self) {
        self.phase = T::zero();
    }
}

#[profiling::all_functions]
impl<T: Scalar> DSPProcess<0, 1> for Phasor<T> {
    fn process(&mut self, _: [Self::Sample; 0]) -> [Self::Sample; 1] {
        let p = self.phase;
        self.phase = (self.phase + self.step).simd_fract();
        [p]
    }
}

impl<T: Scalar> Phasor<T> {
    /// Create a new phasor starting at phase 0.
    #[replace_float_literals(T::from_f64(literal))]
    pub fn new(samplerate: T, freq: T) -> Self {
        Self {
            phase: 0.0,
            step: freq / samplerate,
            samplerate,
        }
    }

    /// Set the phasor frequency, in Hz.
    pub fn set_frequency(&mut self, freq: T) {
        self.step = freq / self.samplerate;
    }

    /// Set the current phase, wrapped into `0..1`.
    pub fn set_phase(&mut self, phase: T) {
        self.phase = phase.simd_fract();
    }

    /// Current phase.
    pub fn phase(&self) -> T {
        self.phase
    }

    /// Phase increment per sample.
    pub fn step(&self) -> T {
        self.step
    }
}
