//! Errors of the control path. The audio path never fails; see [`crate::manager`].
use thiserror::Error;

/// Error returned by the engine constructor, its configuration and its control handle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The sample rate is not a finite, positive number
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f32),
    /// The voice capacity is zero or above the maximum polyphony
    #[error("Invalid voice capacity: {0} (expected 1..={max})", max = crate::MAX_VOICES)]
    InvalidVoiceCapacity(usize),
    /// The event queue cannot hold any event
    #[error("Invalid event queue capacity: {0}")]
    InvalidQueueCapacity(usize),
    /// The event queue is full; the event was not sent
    #[error("Event queue is full")]
    QueueFull,
    /// The configuration could not be parsed
    #[error("TOML Parse Error: {0}")]
    Config(#[from] toml::de::Error),
}
