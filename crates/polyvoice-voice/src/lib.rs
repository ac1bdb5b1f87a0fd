#![warn(missing_docs)]
//! # Voices
//!
//! This crate provides the synth voice, the fixed-capacity voice manager driving it, and the
//! [`Engine`](engine::Engine) wrapping both behind a lock-free event queue.
//!
//! Voices render in internal blocks of [`BLOCK_SIZE`] output samples, at [`OVERSAMPLE`] times the
//! host sample rate. Audio inside a voice is carried on [`Lanes`], laid out as
//! `[left, right, 0, 0]`.
use polyvoice_core::simd::WideF32x4;

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod events;
pub mod manager;
pub mod modmatrix;
pub mod params;
pub mod tuning;
pub mod voice;

/// Number of output samples in an internal block.
pub const BLOCK_SIZE: usize = 16;
/// Oversampling factor voices are rendered at.
pub const OVERSAMPLE: usize = 2;
/// Number of samples in an oversampled internal block.
pub const BLOCK_SIZE_OS: usize = BLOCK_SIZE * OVERSAMPLE;
/// Maximum polyphony.
pub const MAX_VOICES: usize = 64;

/// Stereo sample carried on 4-wide lanes.
pub type Lanes = WideF32x4;

/// Address of a note, as sent by the host.
///
/// In patterns given to [`VoiceManager::find`](manager::VoiceManager::find), any negative field
/// is a wildcard.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct NoteAddress {
    /// Port index
    pub port: i16,
    /// MIDI channel
    pub channel: i16,
    /// MIDI key
    pub key: i16,
    /// Host note identifier, `-1` when the host does not provide one
    pub note_id: i32,
}

impl NoteAddress {
    /// Create a new note address.
    pub const fn new(port: i16, channel: i16, key: i16, note_id: i32) -> Self {
        Self {
            port,
            channel,
            key,
            note_id,
        }
    }

    /// Returns true if this address is matched by the pattern, negative fields of the pattern
    /// matching anything.
    pub fn matches(&self, pattern: &NoteAddress) -> bool {
        fn field<T: PartialEq + PartialOrd + Default>(value: T, pattern: T) -> bool {
            pattern < T::default() || value == pattern
        }
        field(self.port, pattern.port)
            && field(self.channel, pattern.channel)
            && field(self.key, pattern.key)
            && field(self.note_id, pattern.note_id)
    }
}

/// Output of an internal block, planar stereo at the host rate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StereoBlock {
    /// Left channel
    pub left: [f32; BLOCK_SIZE],
    /// Right channel
    pub right: [f32; BLOCK_SIZE],
}

impl Default for StereoBlock {
    fn default() -> Self {
        Self {
            left: [0.0; BLOCK_SIZE],
            right: [0.0; BLOCK_SIZE],
        }
    }
}

impl StereoBlock {
    /// Peak absolute value of each channel.
    pub fn peak(&self) -> [f32; 2] {
        let peak = |ch: &[f32]| ch.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
        [peak(&self.left), peak(&self.right)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NoteAddress::new(-1, -1, -1, -1), true)]
    #[case(NoteAddress::new(0, 1, 60, 7), true)]
    #[case(NoteAddress::new(-1, 1, 60, -1), true)]
    #[case(NoteAddress::new(-1, 2, -1, -1), false)]
    #[case(NoteAddress::new(0, 1, 61, -1), false)]
    #[case(NoteAddress::new(-1, -1, -1, 8), false)]
    fn address_matching(#[case] pattern: NoteAddress, #[case] expected: bool) {
        let address = NoteAddress::new(0, 1, 60, 7);
        assert_eq!(expected, address.matches(&pattern));
    }

    #[test]
    fn block_peak() {
        let mut block = StereoBlock::default();
        block.left[3] = -0.5;
        block.right[9] = 0.25;
        assert_eq!([0.5, 0.25], block.peak());
    }
}
