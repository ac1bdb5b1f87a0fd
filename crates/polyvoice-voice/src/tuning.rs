//! Microtuning query.
use polyvoice_core::util::midi_to_freq;

/// Source of per-key frequencies, consulted when a voice recomputes its pitch.
pub trait TuningProvider: Send {
    /// Frequency of the key on the given channel, or `None` to fall back to equal temperament.
    fn frequency(&self, key: i16, channel: i16) -> Option<f32>;
}

/// Tuning provider always falling back to equal temperament.
#[derive(Debug, Copy, Clone, Default)]
pub struct EqualTemperament;

impl TuningProvider for EqualTemperament {
    fn frequency(&self, _: i16, _: i16) -> Option<f32> {
        None
    }
}

impl<F: Send + Fn(i16, i16) -> Option<f32>> TuningProvider for F {
    fn frequency(&self, key: i16, channel: i16) -> Option<f32> {
        self(key, channel)
    }
}

/// 12-TET frequency of a MIDI key, with the key clamped into `0..=127`.
pub fn equal_temperament(key: i16) -> f32 {
    midi_to_freq(key.clamp(0, 127) as f32)
}

/// Resolve the base frequency of a key, falling back to equal temperament when the provider has
/// no (valid) answer.
pub fn base_frequency(tuning: &dyn TuningProvider, key: i16, channel: i16) -> f32 {
    tuning
        .frequency(key, channel)
        .filter(|f| f.is_finite() && *f > 0.0)
        .unwrap_or_else(|| equal_temperament(key))
}
