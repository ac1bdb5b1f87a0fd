//! Colored noise.
//!
//! White noise is run through two cascaded one-pole sections sharing a signed feedback
//! coefficient. Negative colors darken the noise, positive colors brighten it; the output is
//! normalized so that the level stays comparable across colors.
use fastrand::Rng;

/// Correlated noise generator, one per voice.
#[derive(Debug, Clone)]
pub struct CorrelatedNoise {
    w0: f32,
    w1: f32,
    rng: Rng,
}

impl CorrelatedNoise {
    /// Create a new generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            w0: 0.0,
            w1: 0.0,
            rng: Rng::with_seed(seed),
        }
    }

    /// Clear the filter state, keeping the random sequence position.
    pub fn reset(&mut self) {
        self.w0 = 0.0;
        self.w1 = 0.0;
    }

    /// Produce the next sample.
    ///
    /// # Arguments
    ///
    /// * `color`: Noise color, clamped into `-1..1`
    #[inline]
    pub fn next_sample(&mut self, color: f32) -> f32 {
        let white = self.rng.f32() * 2.0 - 1.0;
        self.step(color, white)
    }

    fn step(&mut self, color: f32, white: f32) -> f32 {
        let wf = color.clamp(-1.0, 1.0) * 0.9;
        let wfabs = wf.abs();
        let m = 1.0 / (1.0 - wfabs).sqrt();
        self.w1 = white * (1.0 - wfabs) - wf * self.w1;
        self.w0 = self.w1 * (1.0 - wfabs) - wf * self.w0;
        self.w0 * m
    }
}
