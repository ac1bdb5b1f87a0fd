//! # Polyphase halfband filter
//!
//! Port of <https://www.musicdsp.org/en/latest/Filters/39-polyphase-filters.html>, used to bring
//! the oversampled voice mix back down to the host rate.
use num_traits::Zero;

use polyvoice_core::dsp::{DSPMeta, DSPProcess};
use polyvoice_core::Scalar;

/// Allpass section in `z^-2`: `y[n] = x[n-2] + a * (x[n] - y[n-2])`.
#[derive(Debug, Copy, Clone)]
struct Allpass<T> {
    a: T,
    x: [T; 2],
    y: [T; 2],
}

impl<T: Zero> Allpass<T> {
    fn new(a: T) -> Self {
        Self {
            a,
            x: std::array::from_fn(|_| T::zero()),
            y: std::array::from_fn(|_| T::zero()),
        }
    }
}

impl<T: Scalar> DSPMeta for Allpass<T> {
    type Sample = T;

    fn latency(&self) -> usize {
        2
    }

    fn reset(&mut self) {
        for s in self.x.iter_mut().chain(self.y.iter_mut()) {
            s.set_zero();
        }
    }
}

#[profiling::all_functions]
impl<T: Scalar> DSPProcess<1, 1> for Allpass<T> {
    fn process(&mut self, [x]: [Self::Sample; 1]) -> [Self::Sample; 1] {
        let [x1, x2] = self.x;
        let [y1, y2] = self.y;
        let y = x2 + (x - y2) * self.a;
        self.x = [x, x1];
        self.y = [y, y1];

        [y]
    }
}

/// Halfband lowpass made of two parallel chains of allpass filters.
#[derive(Debug, Copy, Clone)]
pub struct HalfbandFilter<T, const ORDER: usize> {
    filter_a: [Allpass<T>; ORDER],
    filter_b: [Allpass<T>; ORDER],
    y0: T,
}

impl<T: Scalar, const ORDER: usize> HalfbandFilter<T, ORDER> {
    fn from_coeffs(k_a: [T; ORDER], k_b: [T; ORDER]) -> Self {
        Self {
            filter_a: k_a.map(Allpass::new),
            filter_b: k_b.map(Allpass::new),
            y0: T::zero(),
        }
    }
}

fn chain<T: Scalar, const ORDER: usize>(filters: &mut [Allpass<T>; ORDER], x: T) -> T {
    filters.iter_mut().fold(x, |x, f| f.process([x])[0])
}

impl<T: Scalar, const ORDER: usize> DSPMeta for HalfbandFilter<T, ORDER> {
    type Sample = T;

    fn latency(&self) -> usize {
        2 * ORDER
    }

    fn reset(&mut self) {
        for f in self.filter_a.iter_mut().chain(self.filter_b.iter_mut()) {
            f.reset();
        }
        self.y0.set_zero();
    }
}

#[profiling::all_functions]
impl<T: Scalar, const ORDER: usize> DSPProcess<1, 1> for HalfbandFilter<T, ORDER> {
    fn process(&mut self, [x]: [Self::Sample; 1]) -> [Self::Sample; 1] {
        let y = (chain(&mut self.filter_a, x) + self.y0) * T::from_f64(0.5);
        self.y0 = chain(&mut self.filter_b, x);
        [y]
    }
}

/// Steep 12th-order halfband filter.
#[rustfmt::skip]
pub fn steep_order12<T: Scalar>() -> HalfbandFilter<T, 6> {
    HalfbandFilter::from_coeffs(
        [ 0.036681502163648017
        , 0.2746317593794541
        , 0.5610989697879195
        , 0.769741833862266
        , 0.8922608180038789
        , 0.962094548378084
        ].map(T::from_f64),
        [ 0.13654762463195771
        , 0.42313861743656667
        , 0.6775400499741616
        , 0.839889624849638
        , 0.9315419599631839
        , 0.9878163707328971
        ].map(T::from_f64),
    )
}

/// 2x decimator: filters the oversampled signal and keeps every other sample.
#[derive(Debug, Clone, Copy)]
pub struct Downsampler<T> {
    filter: HalfbandFilter<T, 6>,
}

impl<T: Scalar> Default for Downsampler<T> {
    fn default() -> Self {
        Self {
            filter: steep_order12(),
        }
    }
}

impl<T: Scalar> Downsampler<T> {
    /// Latency of the decimator, in oversampled samples.
    pub fn latency(&self) -> usize {
        self.filter.latency()
    }

    /// Clear the filter memory.
    pub fn reset(&mut self) {
        self.filter.reset();
    }

    /// Downsample 2 samples of input audio, and output a single sample of audio.
    pub fn process(&mut self, [x0, x1]: [T; 2]) -> T {
        let [y] = self.filter.process([x0]);
        let _ = self.filter.process([x1]);
        y
    }

    /// Downsample the input buffer by a factor of 2. Processes as many samples as both buffers
    /// allow; a trailing odd input sample is ignored.
    pub fn process_block(&mut self, input: &[T], output: &mut [T]) {
        for (pair, out) in input.chunks_exact(2).zip(output) {
            *out = self.process([pair[0], pair[1]]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rms(freq: f64) -> f64 {
        let samplerate = 96_000.0;
        let input: Vec<f64> = (0..96_000)
            .map(|i| (std::f64::consts::TAU * freq * i as f64 / samplerate).sin())
            .collect();
        let mut output = vec![0.0; input.len() / 2];
        let mut downsampler = Downsampler::default();
        downsampler.process_block(&input, &mut output);
        let tail = &output[output.len() / 2..];
        (tail.iter().map(|y| y * y).sum::<f64>() / tail.len() as f64).sqrt()
    }

    #[test]
    fn dc_passes_through() {
        let mut downsampler = Downsampler::<f64>::default();
        let mut y = 0.0;
        for _ in 0..2048 {
            y = downsampler.process([0.5, 0.5]);
        }
        assert!((y - 0.5).abs() < 1e-6, "DC output {y}");
    }

    #[test]
    fn passband_tone_is_kept() {
        let rms = rms(1_000.0);
        assert!((rms - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01, "{rms}");
    }

    #[rstest]
    #[case(36_000.0)]
    #[case(40_000.0)]
    #[case(46_000.0)]
    fn images_above_host_nyquist_are_rejected(#[case] freq: f64) {
        let rms = rms(freq);
        assert!(rms < 1e-3, "{freq} Hz: {rms}");
    }

    #[test]
    fn upper_passband_is_kept() {
        let rms = rms(20_000.0);
        assert!((rms - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01, "{rms}");
    }

    #[test]
    fn block_matches_pairwise_processing() {
        let input: Vec<f64> = (0..64).map(|i| (i as f64 * 0.37).sin()).collect();
        let mut block = Downsampler::default();
        let mut output = [0.0; 32];
        block.process_block(&input, &mut output);

        let mut pairwise = Downsampler::default();
        for (pair, y) in input.chunks_exact(2).zip(output) {
            assert_eq!(pairwise.process([pair[0], pair[1]]), y);
        }
    }

    #[test]
    fn reset_clears_memory() {
        let mut downsampler = Downsampler::<f64>::default();
        for _ in 0..64 {
            downsampler.process([1.0, -1.0]);
        }
        downsampler.reset();
        assert_eq!(0.0, downsampler.process([0.0, 0.0]));
    }
}
