//! Parameter catalogue of the synth.
//!
//! Base values are shared between the control context and the audio thread through
//! [`SharedParams`]. Only modulatable parameters get modulation slots attached in each voice; the
//! others are either switches or per-note selections snapshotted when a note starts.
use std::sync::Arc;

use polyvoice_core::parameter::{ParamName, SharedParams};

/// Synth parameters.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ParamName)]
pub enum Param {
    SawActive,
    SawUnisonCount,
    SawUnisonSpread,
    SawCoarse,
    SawFine,
    SawLevel,

    PulseActive,
    PulseWidth,
    PulseOctave,
    PulseCoarse,
    PulseFine,
    PulseLevel,

    #[param_name(display = "Sine Active")]
    SinActive,
    #[param_name(display = "Sine Octave")]
    SinOctave,
    #[param_name(display = "Sine Coarse")]
    SinCoarse,
    #[param_name(display = "Sine Level")]
    SinLevel,

    NoiseActive,
    NoiseColor,
    NoiseLevel,

    #[param_name(display = "SVF Active")]
    SvfActive,
    #[param_name(display = "SVF Cutoff")]
    SvfCutoff,
    #[param_name(display = "SVF Resonance")]
    SvfResonance,
    #[param_name(display = "SVF Mode")]
    SvfMode,
    #[param_name(display = "SVF Keytrack")]
    SvfKeytrack,

    #[param_name(display = "LPF Active")]
    LpfActive,
    #[param_name(display = "LPF Cutoff")]
    LpfCutoff,
    #[param_name(display = "LPF Resonance")]
    LpfResonance,
    #[param_name(display = "LPF Type")]
    LpfType,
    #[param_name(display = "LPF Keytrack")]
    LpfKeytrack,

    #[param_name(display = "Waveshaper Active")]
    WsActive,
    #[param_name(display = "Waveshaper Drive")]
    WsDrive,
    #[param_name(display = "Waveshaper Type")]
    WsType,

    #[param_name(display = "AEG Attack")]
    AegAttack,
    #[param_name(display = "AEG Decay")]
    AegDecay,
    #[param_name(display = "AEG Sustain")]
    AegSustain,
    #[param_name(display = "AEG Release")]
    AegRelease,
    #[param_name(display = "AEG Velocity Sensitivity")]
    AegVelocitySens,
    #[param_name(display = "AEG Pre-Filter Gain")]
    AegPreFilterGain,

    #[param_name(display = "FEG Attack")]
    FegAttack,
    #[param_name(display = "FEG Decay")]
    FegDecay,
    #[param_name(display = "FEG Sustain")]
    FegSustain,
    #[param_name(display = "FEG Release")]
    FegRelease,
    #[param_name(display = "FEG to SVF Cutoff")]
    FegToSvfCutoff,
    #[param_name(display = "FEG to LPF Cutoff")]
    FegToLpfCutoff,

    #[param_name(display = "LFO 1 Active")]
    Lfo1Active,
    #[param_name(display = "LFO 1 Rate")]
    Lfo1Rate,
    #[param_name(display = "LFO 1 Deform")]
    Lfo1Deform,
    #[param_name(display = "LFO 1 Amplitude")]
    Lfo1Amplitude,
    #[param_name(display = "LFO 1 Shape")]
    Lfo1Shape,

    #[param_name(display = "LFO 2 Active")]
    Lfo2Active,
    #[param_name(display = "LFO 2 Rate")]
    Lfo2Rate,
    #[param_name(display = "LFO 2 Deform")]
    Lfo2Deform,
    #[param_name(display = "LFO 2 Amplitude")]
    Lfo2Amplitude,
    #[param_name(display = "LFO 2 Shape")]
    Lfo2Shape,
}

/// Default value, range and modulation support of a parameter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParamInfo {
    /// Default base value
    pub default: f32,
    /// Lowest accepted value
    pub min: f32,
    /// Highest accepted value
    pub max: f32,
    /// Whether voices attach modulation slots to this parameter
    pub modulatable: bool,
}

impl ParamInfo {
    const fn switch(default: bool) -> Self {
        Self {
            default: if default { 1.0 } else { 0.0 },
            min: 0.0,
            max: 1.0,
            modulatable: false,
        }
    }

    const fn choice(default: f32, max: f32) -> Self {
        Self {
            default,
            min: 0.0,
            max,
            modulatable: false,
        }
    }

    const fn float(default: f32, min: f32, max: f32) -> Self {
        Self {
            default,
            min,
            max,
            modulatable: true,
        }
    }
}

impl Param {
    /// Range, default and modulation support of this parameter.
    pub const fn info(self) -> ParamInfo {
        match self {
            Self::SawActive => ParamInfo::switch(true),
            Self::SawUnisonCount => ParamInfo {
                default: 3.0,
                min: 1.0,
                max: 7.0,
                modulatable: false,
            },
            Self::SawUnisonSpread => ParamInfo::float(10.0, 0.0, 100.0),
            Self::SawCoarse | Self::PulseCoarse | Self::SinCoarse => {
                ParamInfo::float(0.0, -24.0, 24.0)
            }
            Self::SawFine | Self::PulseFine => ParamInfo::float(0.0, -100.0, 100.0),
            Self::SawLevel | Self::PulseLevel | Self::SinLevel | Self::NoiseLevel => {
                ParamInfo::float(1.0, 0.0, 1.0)
            }

            Self::PulseActive | Self::SinActive | Self::NoiseActive => ParamInfo::switch(false),
            Self::PulseWidth => ParamInfo::float(0.5, 0.01, 0.99),
            Self::PulseOctave | Self::SinOctave => ParamInfo::float(0.0, -3.0, 3.0),
            Self::NoiseColor => ParamInfo::float(0.0, -1.0, 1.0),

            Self::SvfActive => ParamInfo::switch(true),
            Self::LpfActive | Self::WsActive => ParamInfo::switch(false),
            Self::SvfCutoff | Self::LpfCutoff => ParamInfo::float(69.0, -9.0, 135.0),
            Self::SvfResonance | Self::LpfResonance => ParamInfo::float(0.3, 0.0, 1.0),
            Self::SvfMode => ParamInfo::choice(0.0, 5.0),
            Self::LpfType | Self::WsType => ParamInfo::choice(0.0, 5.0),
            Self::SvfKeytrack | Self::LpfKeytrack => ParamInfo::float(0.0, -2.0, 2.0),

            Self::WsDrive => ParamInfo::float(0.0, -24.0, 24.0),

            Self::AegAttack => ParamInfo::float(0.01, 0.0, 25.0),
            Self::AegDecay => ParamInfo::float(0.2, 0.0, 25.0),
            Self::AegSustain => ParamInfo::float(0.7, 0.0, 1.0),
            Self::AegRelease => ParamInfo::float(0.1, 0.0, 25.0),
            Self::AegVelocitySens => ParamInfo::float(0.2, 0.0, 1.0),
            Self::AegPreFilterGain => ParamInfo::float(0.0, -24.0, 24.0),

            Self::FegAttack => ParamInfo::float(0.01, 0.0, 25.0),
            Self::FegDecay => ParamInfo::float(0.3, 0.0, 25.0),
            Self::FegSustain => ParamInfo::float(0.5, 0.0, 1.0),
            Self::FegRelease => ParamInfo::float(0.2, 0.0, 25.0),
            Self::FegToSvfCutoff | Self::FegToLpfCutoff => ParamInfo::float(0.0, -48.0, 48.0),

            Self::Lfo1Active | Self::Lfo2Active => ParamInfo::switch(false),
            Self::Lfo1Rate | Self::Lfo2Rate => ParamInfo::float(0.0, -7.0, 6.0),
            Self::Lfo1Deform | Self::Lfo2Deform => ParamInfo::float(0.0, -1.0, 1.0),
            Self::Lfo1Amplitude | Self::Lfo2Amplitude => ParamInfo::float(1.0, 0.0, 1.0),
            Self::Lfo1Shape | Self::Lfo2Shape => ParamInfo::choice(0.0, 4.0),
        }
    }

    /// Clamp a value into the range of this parameter. NaN gives the default value.
    pub fn clamp(self, value: f32) -> f32 {
        let info = self.info();
        if value.is_nan() {
            info.default
        } else {
            value.clamp(info.min, info.max)
        }
    }

    /// Returns true if voices attach modulation slots to this parameter.
    pub fn is_modulatable(self) -> bool {
        self.info().modulatable
    }
}

/// Create the shared parameter storage, with every parameter at its default value.
pub fn default_params() -> Arc<SharedParams<Param>> {
    SharedParams::new(|p: Param| p.info().default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        for p in Param::iter() {
            let info = p.info();
            assert!(
                info.min <= info.default && info.default <= info.max,
                "{} default out of range",
                p.name()
            );
        }
    }

    #[test]
    fn switches_are_not_modulatable() {
        for p in [Param::SawActive, Param::SvfMode, Param::LpfType, Param::WsType] {
            assert!(!p.is_modulatable());
        }
        assert!(Param::SvfCutoff.is_modulatable());
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(0, Param::SawActive.into_id());
        assert_eq!(Param::Lfo2Shape, Param::from_id(Param::count() - 1));
        assert_eq!(Some(Param::SvfCutoff), Param::try_from_id(Param::SvfCutoff.into_id()));
    }

    #[test]
    fn default_storage() {
        let params = default_params();
        assert!(params.get_bool(Param::SawActive));
        assert_eq!(69.0, params.get(Param::SvfCutoff));
        assert_eq!(-24.0, Param::WsDrive.clamp(-100.0));
    }

    #[test]
    fn nan_clamps_to_default() {
        assert_eq!(0.0, Param::WsDrive.clamp(f32::NAN));
        assert_eq!(0.2, Param::AegDecay.clamp(f32::NAN));
        assert_eq!(24.0, Param::WsDrive.clamp(f32::INFINITY));
    }

    #[test]
    fn display_names() {
        assert_eq!("Saw Level", Param::SawLevel.name());
        assert_eq!("Sine Level", Param::SinLevel.name());
        assert_eq!("SVF Cutoff", Param::SvfCutoff.name());
    }
}
