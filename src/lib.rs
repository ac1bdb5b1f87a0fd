//! # polyvoice
//!
//! Polyphonic virtual-analog synth engine. Each voice runs oversampled unison saws, a pulse, a
//! sine and noise through a state-variable filter, a waveshaper and a four-pole filter, with
//! per-voice envelopes, LFOs and a modulation matrix.
//!
//! This crate re-exports the workspace crates behind features:
//!
//! | Feature       | Crate                   |
//! |---------------|-------------------------|
//! | (always)      | [`polyvoice_core`]      |
//! | `filters`     | `polyvoice_filters`     |
//! | `oscillators` | `polyvoice_oscillators` |
//! | `saturators`  | `polyvoice_saturators`  |
//! | `voice`       | `polyvoice_voice`       |
pub use polyvoice_core::*;

#[cfg(feature = "filters")]
pub use polyvoice_filters as filters;

#[cfg(feature = "oscillators")]
pub use polyvoice_oscillators as oscillators;

#[cfg(feature = "saturators")]
pub use polyvoice_saturators as saturators;

#[cfg(feature = "voice")]
pub use polyvoice_voice as voice;
