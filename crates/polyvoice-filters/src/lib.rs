#![warn(missing_docs)]
//! # Filters
//!
//! Filters run by each synth voice, plus the decimation filter used by the voice manager.
//!
//! - [`svf`]: stereo two-integrator-loop state variable filter with six output modes
//! - [`quad`]: pluggable filter unit whose coefficient and step functions are selected per note
//! - [`ladder`]: ladder topologies the quad filter units are built from
//! - [`halfband`]: polyphase halfband filter and 2x decimator
pub mod halfband;
pub mod ladder;
pub mod quad;
pub mod svf;
