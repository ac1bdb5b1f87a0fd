//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! sample_rate = 44100.0
//! voice_capacity = 32
//!
//! [mpe]
//! enabled = true
//! pitch_bend_range = 48.0
//! ```
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::MAX_VOICES;

/// MPE settings.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MpeSettings {
    /// When enabled, channel pitch bend on a member channel bends that channel's notes with
    /// the MPE range
    pub enabled: bool,
    /// MPE pitch bend range, in semitones
    pub pitch_bend_range: f32,
}

impl Default for MpeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            pitch_bend_range: 24.0,
        }
    }
}

/// Configuration of an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Host sample rate, in Hz
    pub sample_rate: f32,
    /// Number of voices in the pool, at most [`MAX_VOICES`]
    pub voice_capacity: usize,
    /// Number of events the control to audio queue can hold
    pub event_queue_capacity: usize,
    /// Channel-wide pitch bend range, in semitones
    pub pitch_bend_range: f32,
    /// Seed of the random generators of the voices
    pub seed: u64,
    /// MPE settings
    pub mpe: MpeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            voice_capacity: MAX_VOICES,
            event_queue_capacity: 1024,
            pitch_bend_range: 2.0,
            seed: 0,
            mpe: MpeSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration. Missing keys take their default value.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check that the configuration describes a usable engine.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(self.sample_rate));
        }
        if !(1..=MAX_VOICES).contains(&self.voice_capacity) {
            return Err(EngineError::InvalidVoiceCapacity(self.voice_capacity));
        }
        if self.event_queue_capacity == 0 {
            return Err(EngineError::InvalidQueueCapacity(self.event_queue_capacity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::default(), EngineConfig::from_toml_str("").unwrap());
    }

    #[test]
    fn partial_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            sample_rate = 44100.0
            voice_capacity = 8

            [mpe]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(44_100.0, config.sample_rate);
        assert_eq!(8, config.voice_capacity);
        assert!(config.mpe.enabled);
        assert_eq!(24.0, config.mpe.pitch_bend_range);
        assert_eq!(2.0, config.pitch_bend_range);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = EngineConfig {
            seed: 42,
            ..Default::default()
        };
        let s = config.to_toml_string().unwrap();
        assert_eq!(config, EngineConfig::from_toml_str(&s).unwrap());
    }

    #[rstest]
    #[case("voice_capacity = 0")]
    #[case("voice_capacity = 65")]
    #[case("sample_rate = -1.0")]
    #[case("event_queue_capacity = 0")]
    fn invalid_values_are_rejected(#[case] s: &str) {
        assert!(EngineConfig::from_toml_str(s).is_err());
    }

    #[rstest]
    #[case("voices = 3")]
    #[case("sample_rate = \"fast\"")]
    fn parse_errors_are_reported(#[case] s: &str) {
        let err = EngineConfig::from_toml_str(s).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "{err}");
    }
}
