//! Sine oscillator.
use polyvoice_core::dsp::{DSPMeta, DSPProcess};
use polyvoice_core::Scalar;

use crate::Phasor;

/// Sine oscillator driven by a [`Phasor`], starting at phase 0.
#[derive(Debug, Clone, Copy)]
pub struct Sine<T> {
    phasor: Phasor<T>,
}

impl<T: Scalar> Sine<T> {
    /// Create a new sine oscillator.
    pub fn new(samplerate: T, frequency: T) -> Self {
        Self {
            phasor: Phasor::new(samplerate, frequency),
        }
    }

    /// Set the oscillator frequency, in Hz.
    pub fn set_frequency(&mut self, frequency: T) {
        self.phasor.set_frequency(frequency);
    }
}

impl<T: Scalar> DSPMeta for Sine<T> {
    type Sample = T;

    fn set_samplerate(&mut self, samplerate: f32) {
        self.phasor.set_samplerate(samplerate);
    }

    fn reset(&mut self) {
        self.phasor.reset();
    }
}

#[profiling::all_functions]
impl<T: Scalar> DSPProcess<0, 1> for Sine<T> {
    fn process(&mut self, _: [Self::Sample; 0]) -> [Self::Sample; 1] {
        self.phasor
            .process([])
            .map(|p| (T::simd_two_pi() * p).simd_sin())
    }
}
