//! Four-stage ladder cores, after the VA Filter Design book.
//!
//! Downloaded from <https://www.discodsp.net/VAFilterDesign_2.1.2.pdf>
//!
//! A topology advances the four one-pole stages of a ladder by one explicit step. Feedback is left
//! to the caller: the [`quad`](crate::quad) units subtract their own resonance path from the input
//! before stepping.
use nalgebra::SVector;

use polyvoice_core::Scalar;
use polyvoice_saturators::Saturator;

/// Stage outputs of a four-pole ladder.
pub type Stages<T> = SVector<T, 4>;

/// One explicit integration step of a ladder.
pub trait LadderTopology<T> {
    /// Advance the stages given the integrator gain `g` (in `0..1`) and the feedback-subtracted
    /// input. Returns the new stage outputs.
    fn step(&self, g: T, input: T, stages: Stages<T>) -> Stages<T>;
}

/// Signal entering each stage: the ladder input, then the outputs of the first three stages.
#[inline(always)]
fn stage_inputs<T: Scalar>(input: T, stages: &Stages<T>) -> Stages<T> {
    Stages::from([input, stages[0], stages[1], stages[2]])
}

/// OTA ladder: every stage integrates the saturated difference between what enters it and what it
/// currently outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ota<S>(pub S);

#[profiling::all_functions]
impl<T: Scalar, S: Saturator<T>> LadderTopology<T> for Ota<S> {
    fn step(&self, g: T, input: T, stages: Stages<T>) -> Stages<T> {
        let drive = stage_inputs(input, &stages) - stages;
        stages + drive.map(|d| self.0.saturate(d)) * g
    }
}

/// Transistor ladder: the input and every stage output go through the saturator before being
/// differenced.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transistor<S>(pub S);

#[profiling::all_functions]
impl<T: Scalar, S: Saturator<T>> LadderTopology<T> for Transistor<S> {
    fn step(&self, g: T, input: T, stages: Stages<T>) -> Stages<T> {
        let saturated = stages.map(|y| self.0.saturate(y));
        let drive = stage_inputs(self.0.saturate(input), &saturated) - saturated;
        stages + drive * g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvoice_saturators::{Diode, Tanh};
    use rstest::rstest;

    fn settle<Topo: LadderTopology<f64>>(topology: Topo, input: f64) -> Stages<f64> {
        (0..4096).fold(Stages::zeros(), |y, _| topology.step(0.05, input, y))
    }

    #[rstest]
    fn small_signals_pass_at_dc<Topo: LadderTopology<f64>>(
        #[values(Ota(Tanh), Transistor(Tanh), Transistor(Diode))] topology: Topo,
    ) {
        let y = settle(topology, 0.1);
        assert!((y[3] - 0.1).abs() < 1e-3, "DC output {}", y[3]);
    }

    #[test]
    fn ota_slews_on_large_inputs() {
        let ota = Ota(Tanh);
        let y = ota.step(0.05, 4.0, Stages::zeros());
        assert!(y[0] <= 0.05, "first stage moved by {}", y[0]);
        let y = settle(ota, 4.0);
        assert!((y[3] - 4.0).abs() < 1e-3, "OTA settles on its input, got {}", y[3]);
    }

    #[test]
    fn stages_lag_each_other() {
        let ota = Ota(Tanh);
        let y = (0..20).fold(Stages::zeros(), |y, _| ota.step(0.05, 1.0, y));
        assert!(y[0] > y[1] && y[1] > y[2] && y[2] > y[3] && y[3] > 0.0);
    }
}
