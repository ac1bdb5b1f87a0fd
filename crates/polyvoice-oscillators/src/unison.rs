//! Detune, pan and level coefficients of a unison oscillator stack.
use std::f32::consts::FRAC_PI_2;

/// Maximum number of stacked unison voices.
pub const MAX_UNISON: usize = 7;

/// Per-voice coefficients of a unison stack, computed once per note.
///
/// Voices are spread evenly from fully detuned down and panned left, to fully detuned up and
/// panned right. A single voice is centered, with unity gain on both channels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UnisonGeometry {
    count: usize,
    /// Detune amount of each voice in `-1..1`, to be multiplied by the spread
    pub detune: [f32; MAX_UNISON],
    /// Left channel gain of each voice
    pub pan_left: [f32; MAX_UNISON],
    /// Right channel gain of each voice
    pub pan_right: [f32; MAX_UNISON],
    /// Level normalization of each voice
    pub level: [f32; MAX_UNISON],
}

impl Default for UnisonGeometry {
    fn default() -> Self {
        Self::new(1)
    }
}

impl UnisonGeometry {
    /// Compute the geometry for `count` voices. Counts are clamped into `1..=MAX_UNISON`.
    pub fn new(count: i32) -> Self {
        let count = count.clamp(1, MAX_UNISON as i32) as usize;
        let mut this = Self {
            count,
            detune: [0.0; MAX_UNISON],
            pan_left: [0.0; MAX_UNISON],
            pan_right: [0.0; MAX_UNISON],
            level: [0.0; MAX_UNISON],
        };
        if count == 1 {
            this.pan_left[0] = 1.0;
            this.pan_right[0] = 1.0;
            this.level[0] = 1.0;
            return this;
        }

        let norm = 1.0 / (count as f32).sqrt();
        for i in 0..count {
            let d = i as f32 / (count - 1) as f32;
            this.detune[i] = 2.0 * d - 1.0;
            this.pan_left[i] = (FRAC_PI_2 * d).cos();
            this.pan_right[i] = (FRAC_PI_2 * d).sin();
            this.level[i] = norm;
        }
        this
    }

    /// Number of voices in the stack.
    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn levels_have_unit_power(#[values(1, 2, 3, 4, 5, 6, 7)] count: i32) {
        let geometry = UnisonGeometry::new(count);
        let power: f32 = geometry.level[..geometry.count()].iter().map(|l| l * l).sum();
        assert!((power - 1.0).abs() < 1e-6, "{power}");
    }

    #[test]
    fn single_voice_is_centered() {
        let geometry = UnisonGeometry::new(1);
        assert_eq!(0.0, geometry.detune[0]);
        assert_eq!(1.0, geometry.pan_left[0]);
        assert_eq!(1.0, geometry.pan_right[0]);
        assert_eq!(1.0, geometry.level[0]);
    }

    #[rstest]
    #[case(0)]
    #[case(-4)]
    fn degenerate_counts_are_one_voice(#[case] count: i32) {
        assert_eq!(UnisonGeometry::new(1), UnisonGeometry::new(count));
    }

    #[test]
    fn stack_spans_full_detune_and_pan() {
        let geometry = UnisonGeometry::new(3);
        assert_eq!([-1.0, 0.0, 1.0], geometry.detune[..3]);
        assert_eq!(1.0, geometry.pan_left[0]);
        assert_eq!(0.0, geometry.pan_right[0]);
        assert!(geometry.pan_left[2].abs() < 1e-6);
        assert!((geometry.pan_right[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn counts_above_maximum_are_clamped() {
        assert_eq!(MAX_UNISON, UnisonGeometry::new(100).count());
    }
}
