//! ADSR envelope generator, run once per oversampled block.
use crate::BLOCK_SIZE_OS;

/// Level under which a releasing envelope is considered silent.
pub const SILENCE: f32 = 1e-5;

const MIN_TIME: f32 = 1e-4;
// ln(1000): exponential segments fall by 60 dB over their time parameter
const LN_1000: f32 = 6.907_755;

/// Envelope stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    /// Silent, waiting for a note
    #[default]
    Idle,
    /// Linear ramp towards 1
    Attack,
    /// Exponential fall towards the sustain level
    Decay,
    /// Holding the sustain level while gated
    Sustain,
    /// Exponential fall towards 0
    Release,
}

/// Segment times and sustain level, read at block rate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AdsrValues {
    /// Attack time, in seconds
    pub attack: f32,
    /// Decay time, in seconds
    pub decay: f32,
    /// Sustain level, in `0..1`
    pub sustain: f32,
    /// Release time, in seconds
    pub release: f32,
}

/// ADSR envelope generator.
///
/// Every call to [`Adsr::process_block`] fills a per-sample cache of [`BLOCK_SIZE_OS`] values,
/// used as the amplitude scale of a voice, and reports the last value of the block, used as a
/// block-rate modulation source.
#[derive(Debug, Clone)]
pub struct Adsr {
    stage: Stage,
    level: f32,
    samplerate: f32,
    cache: [f32; BLOCK_SIZE_OS],
}

impl Adsr {
    /// Create a new idle envelope running at the given (oversampled) sample rate.
    pub fn new(samplerate: f32) -> Self {
        Self {
            stage: Stage::Idle,
            level: 0.0,
            samplerate,
            cache: [0.0; BLOCK_SIZE_OS],
        }
    }

    /// Change the sample rate of the envelope.
    pub fn set_samplerate(&mut self, samplerate: f32) {
        self.samplerate = samplerate;
    }

    /// Restart the attack stage from the given level.
    pub fn attack_from(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
        self.stage = Stage::Attack;
    }

    /// Stop immediately.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.cache.fill(0.0);
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns true when the envelope has gone back to silence.
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// Last value of the latest block.
    pub fn output(&self) -> f32 {
        self.cache[BLOCK_SIZE_OS - 1]
    }

    /// Per-sample values of the latest block.
    pub fn output_block(&self) -> &[f32; BLOCK_SIZE_OS] {
        &self.cache
    }

    fn exp_coefficient(&self, time: f32) -> f32 {
        (-LN_1000 / (time.max(MIN_TIME) * self.samplerate)).exp()
    }

    /// Run the envelope for one block, returning its last value.
    ///
    /// Clearing `gated` moves any stage but idle into release.
    #[profiling::function]
    pub fn process_block(&mut self, values: AdsrValues, gated: bool) -> f32 {
        let sustain = values.sustain.clamp(0.0, 1.0);
        let attack_step = 1.0 / (values.attack.max(MIN_TIME) * self.samplerate);
        let decay_coeff = self.exp_coefficient(values.decay);
        let release_coeff = self.exp_coefficient(values.release);

        if !gated && !matches!(self.stage, Stage::Idle | Stage::Release) {
            self.stage = Stage::Release;
        }

        for out in &mut self.cache {
            match self.stage {
                Stage::Idle => self.level = 0.0,
                Stage::Attack => {
                    self.level += attack_step;
                    if self.level >= 1.0 {
                        self.level = 1.0;
                        self.stage = Stage::Decay;
                    }
                }
                Stage::Decay => {
                    self.level = sustain + (self.level - sustain) * decay_coeff;
                    if (self.level - sustain).abs() < SILENCE {
                        self.level = sustain;
                        self.stage = Stage::Sustain;
                    }
                }
                Stage::Sustain => self.level = sustain,
                Stage::Release => {
                    self.level *= release_coeff;
                    if self.level < SILENCE {
                        self.level = 0.0;
                        self.stage = Stage::Idle;
                    }
                }
            }
            *out = self.level;
        }
        self.output()
    }
}
