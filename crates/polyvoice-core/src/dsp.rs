//! DSP traits and block-rate helpers.
use crate::Scalar;

/// DSP metadata trait. Implementors carry a sample type, and can optionally react to sample rate
/// changes, report latency and be reset.
#[allow(unused_variables)]
pub trait DSPMeta {
    /// Type of the audio sample used by this DSP instance.
    type Sample: Scalar;

    /// Inform the DSP instance of a new sample rate.
    fn set_samplerate(&mut self, samplerate: f32) {}

    /// Report the latency of this DSP instance, in samples.
    fn latency(&self) -> usize {
        0
    }

    /// Reset this instance. Parameters are kept, but memory and derived state is put back to a
    /// well-known default value.
    fn reset(&mut self) {}
}

/// DSP trait for processes working on a per-sample basis.
///
/// Multichannel I/O is determined by the `I` and `O` const generics; each implementor documents
/// what its inputs and outputs mean.
pub trait DSPProcess<const I: usize, const O: usize>: DSPMeta {
    /// Process a single sample of audio.
    fn process(&mut self, x: [Self::Sample; I]) -> [Self::Sample; O];
}

/// Linear interpolation of a block-rate value across the samples of a block.
///
/// Each call to [`BlockLerp::set_target`] starts a new ramp from the previous target, so that a
/// value updated once per block changes without steps.
#[derive(Debug, Copy, Clone, Default)]
pub struct BlockLerp {
    current: f32,
    target: f32,
    step: f32,
}

impl BlockLerp {
    /// Create a new interpolator resting at the given value.
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
        }
    }

    /// Jump directly to the value, cancelling any ongoing ramp.
    pub fn instantize(&mut self, value: f32) {
        *self = Self::new(value);
    }

    /// Start a ramp towards `target`, reached after `block_size` calls to [`Self::next_value`].
    pub fn set_target(&mut self, target: f32, block_size: usize) {
        self.current = self.target;
        self.target = target;
        self.step = (target - self.current) / block_size.max(1) as f32;
    }

    /// Advance the ramp by one sample and return the new value.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        self.current += self.step;
        self.current
    }

    /// Current value of the ramp.
    pub fn current(&self) -> f32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(16)]
    #[case(32)]
    fn block_lerp_reaches_target(#[case] block_size: usize) {
        let mut lerp = BlockLerp::new(0.0);
        lerp.set_target(1.0, block_size);
        let mut last = 0.0;
        for _ in 0..block_size {
            let next = lerp.next_value();
            assert!(next > last);
            last = next;
        }
        assert!((lerp.current() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn block_lerp_restarts_from_previous_target() {
        let mut lerp = BlockLerp::new(0.0);
        lerp.set_target(1.0, 4);
        lerp.next_value();
        lerp.set_target(2.0, 4);
        assert_eq!(1.0, lerp.current());
        assert_eq!(1.25, lerp.next_value());
    }
}
