//! Events sent from the control context to the audio thread.
use crate::modmatrix::ModRouting;
use crate::params::Param;
use crate::voice::NoteExpression;
use crate::NoteAddress;

/// Event carried by the engine queue. Events are applied in arrival order, before the block they
/// arrived in renders.
///
/// Note addresses in events other than [`NoteEvent::NoteOn`] are patterns: negative fields match
/// any voice.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum NoteEvent {
    /// Start a note
    NoteOn {
        /// Address of the new note
        address: NoteAddress,
        /// Velocity, in `0..1`
        velocity: f32,
        /// Retuning of the note, in semitones
        retune: f32,
    },
    /// Release matching notes
    NoteOff {
        /// Notes to release
        address: NoteAddress,
        /// Release velocity, in `0..1`
        velocity: f32,
    },
    /// Set the external modulation of a parameter on matching notes
    PolyModulation {
        /// Modulated notes
        address: NoteAddress,
        /// Modulated parameter
        param: Param,
        /// Modulation offset, in units of the parameter
        value: f32,
    },
    /// Channel pitch bend
    PitchBend {
        /// MIDI channel, negative for all channels
        channel: i16,
        /// 14-bit bend value, 8192 at rest
        value: u16,
    },
    /// Note expression on matching notes
    NoteExpression {
        /// Target notes
        address: NoteAddress,
        /// Kind of expression
        kind: NoteExpression,
        /// Expression value
        value: f32,
    },
    /// Polyphonic aftertouch on matching notes
    PolyAftertouch {
        /// Target notes
        address: NoteAddress,
        /// 7-bit pressure value
        value: u8,
    },
    /// Channel pressure
    ChannelPressure {
        /// MIDI channel, negative for all channels
        channel: i16,
        /// 7-bit pressure value
        value: u8,
    },
    /// Control change
    Cc {
        /// MIDI channel, negative for all channels
        channel: i16,
        /// Controller number
        cc: u8,
        /// 7-bit controller value
        value: u8,
    },
    /// Replace a row of the modulation matrix
    SetModRouting {
        /// Row index
        row: usize,
        /// New routing
        routing: ModRouting,
    },
    /// Change the MPE configuration
    MpeConfig {
        /// Whether MPE is enabled
        enabled: bool,
        /// MPE pitch bend range, in semitones
        pitch_bend_range: f32,
    },
}
