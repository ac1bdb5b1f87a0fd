//! Block-rate low frequency oscillator, used as a modulation source.
use fastrand::Rng;

/// LFO waveform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LfoShape {
    /// Sine
    #[default]
    Sine,
    /// Symmetric triangle
    Triangle,
    /// Rising ramp
    Ramp,
    /// Square
    Square,
    /// Random value held for a full period
    SampleAndHold,
}

impl LfoShape {
    /// All shapes, in index order.
    pub const ALL: [Self; 5] = [
        Self::Sine,
        Self::Triangle,
        Self::Ramp,
        Self::Square,
        Self::SampleAndHold,
    ];

    /// Decode a shape from its index; out of range indices fall back to [`LfoShape::Sine`].
    pub fn from_index(index: i32) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or_default()
    }
}

/// Block-rate LFO producing a bipolar output scaled by its amplitude.
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    dt_per_hz: f32,
    held: f32,
    output: f32,
    rng: Rng,
}

impl Lfo {
    /// Create a new LFO advancing by `block_size` samples at `samplerate` on every step.
    pub fn new(samplerate: f32, block_size: usize, seed: u64) -> Self {
        let mut rng = Rng::with_seed(seed);
        let held = rng.f32() * 2.0 - 1.0;
        Self {
            phase: 0.0,
            dt_per_hz: block_size as f32 / samplerate,
            held,
            output: 0.0,
            rng,
        }
    }

    /// Update the rate at which the phase advances.
    pub fn set_samplerate(&mut self, samplerate: f32, block_size: usize) {
        self.dt_per_hz = block_size as f32 / samplerate;
    }

    /// Restart the LFO at phase 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.output = 0.0;
        self.held = self.rng.f32() * 2.0 - 1.0;
    }

    /// Current phase, in `0..1`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Last computed output.
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Compute the output for this block, then advance the phase by one block.
    ///
    /// # Arguments
    ///
    /// * `shape`: Waveform
    /// * `rate`: Rate in octaves relative to 1 Hz
    /// * `deform`: Phase skew in `-1..1`, 0 leaving the waveform untouched
    /// * `amplitude`: Output scale
    #[profiling::function]
    pub fn step(&mut self, shape: LfoShape, rate: f32, deform: f32, amplitude: f32) -> f32 {
        let skew = (-2.0 * deform.clamp(-1.0, 1.0)).exp2();
        let p = self.phase.powf(skew);
        let y = match shape {
            LfoShape::Sine => (std::f32::consts::TAU * p).sin(),
            LfoShape::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            LfoShape::Ramp => 2.0 * p - 1.0,
            LfoShape::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoShape::SampleAndHold => self.held,
        };
        self.output = amplitude * y;

        let next = self.phase + rate.clamp(-10.0, 8.0).exp2() * self.dt_per_hz;
        if next >= 1.0 {
            self.held = self.rng.f32() * 2.0 - 1.0;
        }
        self.phase = next.fract();
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn one_hz_period() {
        // 100 blocks of 10 samples at 1 kHz make a one second period
        let mut lfo = Lfo::new(1000.0, 10, 0);
        for _ in 0..100 {
            lfo.step(LfoShape::Ramp, 0.0, 0.0, 1.0);
        }
        assert!(lfo.phase() < 1e-3 || lfo.phase() > 1.0 - 1e-3, "{}", lfo.phase());
    }

    #[rstest]
    #[case(LfoShape::Sine, 0.0)]
    #[case(LfoShape::Triangle, -1.0)]
    #[case(LfoShape::Ramp, -1.0)]
    #[case(LfoShape::Square, 1.0)]
    fn starts_at_phase_zero(#[case] shape: LfoShape, #[case] expected: f32) {
        let mut lfo = Lfo::new(48_000.0, 16, 0);
        assert!((lfo.step(shape, 3.0, 0.0, 1.0) - expected).abs() < 1e-6);
    }

    #[rstest]
    fn output_is_scaled_by_amplitude(
        #[values(LfoShape::Sine, LfoShape::Triangle, LfoShape::Square, LfoShape::SampleAndHold)]
        shape: LfoShape,
    ) {
        let mut lfo = Lfo::new(48_000.0, 16, 1);
        for _ in 0..10_000 {
            let y = lfo.step(shape, 2.0, 0.3, 0.5);
            assert!(y.abs() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn sample_and_hold_changes_once_per_period() {
        let mut lfo = Lfo::new(1000.0, 10, 9);
        let values: Vec<f32> = (0..300)
            .map(|_| lfo.step(LfoShape::SampleAndHold, 0.0, 0.0, 1.0))
            .collect();
        let changes = values.windows(2).filter(|w| w[0] != w[1]).count();
        assert!((2..=3).contains(&changes), "{changes} changes");
    }

    #[test]
    fn unknown_shape_index_is_sine() {
        assert_eq!(LfoShape::Sine, LfoShape::from_index(42));
        assert_eq!(LfoShape::Square, LfoShape::from_index(3));
    }
}
