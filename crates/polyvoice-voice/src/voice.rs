//! # Synth voice
//!
//! A voice owns the full per-note signal chain: a bank of four oscillators, a state variable
//! filter, a waveshaper, a quad filter unit, and the two envelopes driving the amplitude and the
//! filter cutoffs.
//!
//! Voices are constructed once with the voice pool and are never destroyed; [`SynthVoice::start`]
//! reinitialises every piece of per-note state.
use std::sync::Arc;

use polyvoice_core::dsp::{BlockLerp, DSPMeta, DSPProcess};
use polyvoice_core::parameter::{ModulatedValue, ModulationSlots, SharedParams};
use polyvoice_core::simd::SimdValue;
use polyvoice_core::util::{db_to_linear, midi_to_freq, semitone_to_ratio};
use polyvoice_core::Scalar;
use polyvoice_filters::quad::{QuadFilterType, QuadFilterUnit};
use polyvoice_filters::svf::{Svf, SvfMode};
use polyvoice_oscillators::lfo::{Lfo, LfoShape};
use polyvoice_oscillators::noise::CorrelatedNoise;
use polyvoice_oscillators::polyblep::{Pulse, PulseBLEP, SawBLEP, Sawtooth};
use polyvoice_oscillators::sine::Sine;
use polyvoice_oscillators::unison::{UnisonGeometry, MAX_UNISON};
use polyvoice_saturators::waveshaper::{Waveshaper, WaveshaperType};

use crate::envelope::{Adsr, AdsrValues};
use crate::modmatrix::{ModMatrix, ModSource, ModSourceValues};
use crate::params::Param;
use crate::tuning::{base_frequency, TuningProvider};
use crate::{Lanes, NoteAddress, BLOCK_SIZE_OS, OVERSAMPLE};

/// Gain applied to every oscillator before mixing.
pub const HEADROOM: f32 = 0.2;

const OCTAVE_RATIOS: [f32; 7] = [0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0];

const OSC_LEVELS: [Param; 4] = [
    Param::SawLevel,
    Param::PulseLevel,
    Param::SinLevel,
    Param::NoiseLevel,
];

const LFO_SOURCES: [ModSource; 2] = [ModSource::Lfo1, ModSource::Lfo2];
const LFO_PARAMS: [[Param; 3]; 2] = [
    [Param::Lfo1Rate, Param::Lfo1Deform, Param::Lfo1Amplitude],
    [Param::Lfo2Rate, Param::Lfo2Deform, Param::Lfo2Amplitude],
];

fn octave_ratio(octave: f32) -> f32 {
    let index = (octave.round() as i32 + 3).clamp(0, OCTAVE_RATIOS.len() as i32 - 1);
    OCTAVE_RATIOS[index as usize]
}

fn choice(params: &SharedParams<Param>, param: Param) -> i32 {
    params.get(param).round() as i32
}

/// Fill `gain` with the interpolated level of an oscillator, shaped as `HEADROOM * level³`.
fn level_curve(level: &mut BlockLerp, gain: &mut [f32; BLOCK_SIZE_OS]) {
    for g in gain {
        let l = level.next_value();
        *g = HEADROOM * l * l * l;
    }
}

/// Clamp a controller value into `0..1`. NaN reads as 0.
fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Kind of a per-note expression sent by the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoteExpression {
    /// Note volume
    Volume,
    /// Note pan
    Pan,
    /// Tuning offset, in semitones
    Tuning,
    /// Vibrato depth
    Vibrato,
    /// Expression
    Expression,
    /// Brightness
    Brightness,
    /// Pressure
    Pressure,
}

/// Choices made when a note starts, held for the lifetime of the note.
#[derive(Debug, Copy, Clone, Default)]
struct NoteSelection {
    saw: bool,
    pulse: bool,
    sine: bool,
    noise: bool,
    svf: bool,
    lpf: bool,
    waveshaper: bool,
    lfo: [bool; 2],
    lfo_shape: [LfoShape; 2],
}

impl NoteSelection {
    fn snapshot(params: &SharedParams<Param>) -> Self {
        Self {
            saw: params.get_bool(Param::SawActive),
            pulse: params.get_bool(Param::PulseActive),
            sine: params.get_bool(Param::SinActive),
            noise: params.get_bool(Param::NoiseActive),
            svf: params.get_bool(Param::SvfActive),
            lpf: params.get_bool(Param::LpfActive),
            waveshaper: params.get_bool(Param::WsActive),
            lfo: [
                params.get_bool(Param::Lfo1Active),
                params.get_bool(Param::Lfo2Active),
            ],
            lfo_shape: [
                LfoShape::from_index(choice(params, Param::Lfo1Shape)),
                LfoShape::from_index(choice(params, Param::Lfo2Shape)),
            ],
        }
    }
}

/// Synth voice, rendering a stereo signal at the oversampled rate.
#[derive(Debug, Clone)]
pub struct SynthVoice {
    params: Arc<SharedParams<Param>>,
    slots: ModulationSlots<Param>,
    sources: ModSourceValues,
    address: NoteAddress,
    active: bool,
    gated: bool,
    samplerate: f32,
    base_frequency: f32,
    velocity: f32,
    release_velocity: f32,
    retune: f32,
    pitch_bend: f32,
    mpe_bend: f32,
    tuning_expression: f32,
    selection: NoteSelection,
    unison: UnisonGeometry,
    saws: [Sawtooth<f32>; MAX_UNISON],
    pulse: Pulse<f32>,
    sine: Sine<f32>,
    noise: CorrelatedNoise,
    saw_level: BlockLerp,
    pulse_level: BlockLerp,
    sine_level: BlockLerp,
    noise_level: BlockLerp,
    pre_filter_gain: BlockLerp,
    svf: Svf<Lanes>,
    waveshaper: Waveshaper<Lanes>,
    quad: QuadFilterUnit<Lanes>,
    aeg: Adsr,
    feg: Adsr,
    lfos: [Lfo; 2],
    output: [Lanes; BLOCK_SIZE_OS],
}

impl SynthVoice {
    /// Create a new inactive voice.
    ///
    /// # Arguments
    ///
    /// * `samplerate`: Host sample rate; the voice runs at [`OVERSAMPLE`] times this rate
    /// * `params`: Shared base values of the parameters
    /// * `seed`: Seed of the random generators of the voice (noise, sample & hold LFOs)
    pub fn new(samplerate: f32, params: Arc<SharedParams<Param>>, seed: u64) -> Self {
        let samplerate = samplerate * OVERSAMPLE as f32;
        let lanes_samplerate = Lanes::splat(samplerate);
        Self {
            params,
            slots: ModulationSlots::new(Param::is_modulatable),
            sources: ModSourceValues::default(),
            address: NoteAddress::default(),
            active: false,
            gated: false,
            samplerate,
            base_frequency: 440.0,
            velocity: 0.0,
            release_velocity: 0.0,
            retune: 0.0,
            pitch_bend: 0.0,
            mpe_bend: 0.0,
            tuning_expression: 0.0,
            selection: NoteSelection::default(),
            unison: UnisonGeometry::default(),
            saws: std::array::from_fn(|_| {
                Sawtooth::new(samplerate, 440.0, SawBLEP::default())
            }),
            pulse: Pulse::new(samplerate, 440.0, PulseBLEP::new(0.5)),
            sine: Sine::new(samplerate, 440.0),
            noise: CorrelatedNoise::new(seed),
            saw_level: BlockLerp::default(),
            pulse_level: BlockLerp::default(),
            sine_level: BlockLerp::default(),
            noise_level: BlockLerp::default(),
            pre_filter_gain: BlockLerp::new(1.0),
            svf: Svf::new(lanes_samplerate, None),
            waveshaper: Waveshaper::default(),
            quad: QuadFilterUnit::new(lanes_samplerate, None),
            aeg: Adsr::new(samplerate),
            feg: Adsr::new(samplerate),
            lfos: [
                Lfo::new(samplerate, BLOCK_SIZE_OS, seed.wrapping_add(1)),
                Lfo::new(samplerate, BLOCK_SIZE_OS, seed.wrapping_add(2)),
            ],
            output: [Lanes::splat(0.0); BLOCK_SIZE_OS],
        }
    }

    /// Address of the note currently (or last) bound to this voice.
    pub fn address(&self) -> NoteAddress {
        self.address
    }

    /// Returns true while the voice produces sound, from note start until retirement.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true between note start and note release.
    pub fn is_gated(&self) -> bool {
        self.gated
    }

    /// Returns true once a released voice has decayed to silence.
    pub fn is_finished(&self) -> bool {
        self.active && !self.gated && self.aeg.is_idle()
    }

    /// Note-on velocity, in `0..1`.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Base frequency of the note, before any pitch offset.
    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    /// Sum of the pitch offsets currently applied on top of the base frequency, in semitones.
    pub fn pitch_offset(&self) -> f32 {
        self.pitch_bend + self.mpe_bend + self.tuning_expression + self.retune
    }

    /// Unison geometry selected when the note started.
    pub fn unison(&self) -> &UnisonGeometry {
        &self.unison
    }

    /// Current value of a modulation source.
    pub fn mod_source(&self, source: ModSource) -> f32 {
        self.sources.get(source)
    }

    /// Resolve the modulated value of a parameter.
    pub fn modulated(&self, param: Param) -> ModulatedValue {
        self.slots.resolve(param, self.params.get(param))
    }

    fn value(&self, param: Param) -> f32 {
        param.clamp(self.modulated(param).value())
    }

    fn adsr_values(&self, [attack, decay, sustain, release]: [Param; 4]) -> AdsrValues {
        AdsrValues {
            attack: self.value(attack),
            decay: self.value(decay),
            sustain: self.value(sustain),
            release: self.value(release),
        }
    }

    /// Start a new note on this voice.
    ///
    /// Per-note selections (oscillator and filter switches, unison count, filter and waveshaper
    /// types, LFO shapes) are read here and held until the next start.
    pub fn start(
        &mut self,
        address: NoteAddress,
        velocity: f32,
        retune: f32,
        tuning: &dyn TuningProvider,
    ) {
        self.address = address;
        self.active = true;
        self.gated = true;
        self.velocity = unit(velocity);
        self.release_velocity = 0.0;
        self.retune = if retune.is_finite() { retune } else { 0.0 };
        self.pitch_bend = 0.0;
        self.mpe_bend = 0.0;
        self.tuning_expression = 0.0;
        self.slots.clear();

        self.selection = NoteSelection::snapshot(&self.params);
        self.unison = UnisonGeometry::new(choice(&self.params, Param::SawUnisonCount));
        let count = self.unison.count();
        for (i, saw) in self.saws.iter_mut().enumerate() {
            saw.reset();
            saw.phasor.set_phase((i as f32 / count as f32).fract());
        }
        self.pulse.reset();
        self.sine.reset();
        self.noise.reset();

        self.svf.reset();
        self.svf
            .set_mode(SvfMode::from_index(choice(&self.params, Param::SvfMode)));
        self.quad
            .init(QuadFilterType::from_index(choice(&self.params, Param::LpfType)));
        self.waveshaper
            .init(WaveshaperType::from_index(choice(&self.params, Param::WsType)));

        self.aeg.attack_from(0.0);
        self.feg.attack_from(0.0);
        for lfo in &mut self.lfos {
            lfo.reset();
        }
        self.sources = ModSourceValues::default();
        self.sources.set(ModSource::Velocity, self.velocity);

        self.base_frequency = base_frequency(tuning, address.key, address.channel);
        self.saw_level.instantize(self.value(Param::SawLevel));
        self.pulse_level.instantize(self.value(Param::PulseLevel));
        self.sine_level.instantize(self.value(Param::SinLevel));
        self.noise_level.instantize(self.value(Param::NoiseLevel));
        self.pre_filter_gain
            .instantize(db_to_linear(self.value(Param::AegPreFilterGain)));
        self.recalc_filters();
        self.recalc_pitch();
    }

    /// Release the note. The voice keeps rendering its release until the amplitude envelope is
    /// silent.
    pub fn release(&mut self, velocity: f32) {
        self.gated = false;
        self.release_velocity = unit(velocity);
        self.sources
            .set(ModSource::ReleaseVelocity, self.release_velocity);
    }

    /// Mark the voice as free. Called by the voice manager when retiring the voice.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.gated = false;
    }

    /// Overwrite the external modulation offset of a parameter. Returns false, and does nothing,
    /// when the parameter is not modulatable or the value is not finite. Takes effect at the next
    /// block.
    pub fn apply_external_mod(&mut self, param: Param, value: f32) -> bool {
        value.is_finite() && self.slots.set_external(param, value)
    }

    /// Handle a note expression. Only tuning is interpreted; it recomputes the pitch immediately.
    pub fn receive_note_expression(&mut self, kind: NoteExpression, value: f32) {
        if kind == NoteExpression::Tuning && value.is_finite() {
            self.tuning_expression = value;
            self.recalc_pitch();
        }
    }

    /// Set the channel-wide pitch bend, in semitones.
    pub fn set_pitch_bend(&mut self, semitones: f32) {
        if semitones.is_finite() {
            self.pitch_bend = semitones;
            self.recalc_pitch();
        }
    }

    /// Set the MPE (per-channel) pitch bend, in semitones.
    pub fn set_mpe_bend(&mut self, semitones: f32) {
        if semitones.is_finite() {
            self.mpe_bend = semitones;
            self.recalc_pitch();
        }
    }

    /// Set the polyphonic aftertouch, in `0..1`.
    pub fn set_poly_aftertouch(&mut self, value: f32) {
        self.sources.set(ModSource::PolyAftertouch, unit(value));
    }

    /// Set the channel pressure, in `0..1`. Feeds both the channel aftertouch and MPE pressure
    /// sources.
    pub fn set_channel_pressure(&mut self, value: f32) {
        let value = unit(value);
        self.sources.set(ModSource::ChannelAftertouch, value);
        self.sources.set(ModSource::MpePressure, value);
    }

    /// Handle a MIDI CC, with the value in `0..1`. CC 1 drives the mod wheel and CC 74 the MPE
    /// timbre; other controllers are ignored.
    pub fn apply_cc(&mut self, cc: u8, value: f32) {
        let value = unit(value);
        match cc {
            1 => self.sources.set(ModSource::ModWheel, value),
            74 => self.sources.set(ModSource::MpeTimbre, value),
            _ => {}
        }
    }

    fn recalc_filters(&mut self) {
        if self.selection.svf {
            let cutoff = midi_to_freq(self.value(Param::SvfCutoff));
            let resonance = self.value(Param::SvfResonance);
            self.svf
                .set_coefficients(Lanes::splat(cutoff), Lanes::splat(resonance));
        }
        if self.selection.lpf {
            let cutoff = midi_to_freq(self.value(Param::LpfCutoff));
            let resonance = self.value(Param::LpfResonance);
            self.quad
                .set_coefficients(Lanes::splat(cutoff), Lanes::splat(resonance));
        }
    }

    fn recalc_pitch(&mut self) {
        let offset = self.pitch_offset();
        let max_frequency = 0.45 * self.samplerate;
        let base = self.base_frequency;
        let frequency = |ratio: f32, semitones: f32| {
            (base * ratio * semitone_to_ratio(semitones)).clamp(0.0, max_frequency)
        };

        let coarse = self.value(Param::SawCoarse);
        let fine = self.value(Param::SawFine);
        let spread = self.value(Param::SawUnisonSpread);
        for (saw, detune) in self.saws[..self.unison.count()]
            .iter_mut()
            .zip(self.unison.detune)
        {
            saw.set_frequency(frequency(1.0, coarse + (spread * detune + fine) / 100.0 + offset));
        }

        let octave = octave_ratio(self.value(Param::PulseOctave));
        let semitones =
            self.value(Param::PulseCoarse) + self.value(Param::PulseFine) * 0.01 + offset;
        self.pulse.set_frequency(frequency(octave, semitones));
        self.pulse
            .blep
            .set_pulse_width(self.value(Param::PulseWidth));

        let octave = octave_ratio(self.value(Param::SinOctave));
        self.sine
            .set_frequency(frequency(octave, self.value(Param::SinCoarse) + offset));
    }

    fn update_modulation(&mut self, matrix: &ModMatrix) {
        let aeg = self.adsr_values([
            Param::AegAttack,
            Param::AegDecay,
            Param::AegSustain,
            Param::AegRelease,
        ]);
        let feg = self.adsr_values([
            Param::FegAttack,
            Param::FegDecay,
            Param::FegSustain,
            Param::FegRelease,
        ]);
        let aeg = self.aeg.process_block(aeg, self.gated);
        let feg = self.feg.process_block(feg, self.gated);
        self.sources.set(ModSource::Aeg, aeg);
        self.sources.set(ModSource::Feg, feg);

        for i in 0..self.lfos.len() {
            let [rate, deform, amplitude] = LFO_PARAMS[i].map(|p| self.value(p));
            let y = if self.selection.lfo[i] {
                self.lfos[i].step(self.selection.lfo_shape[i], rate, deform, amplitude)
            } else {
                0.0
            };
            self.sources.set(LFO_SOURCES[i], y);
        }

        let key = self.address.key as f32 - 69.0;
        let svf = feg * self.value(Param::FegToSvfCutoff) + self.value(Param::SvfKeytrack) * key;
        let lpf = feg * self.value(Param::FegToLpfCutoff) + self.value(Param::LpfKeytrack) * key;
        self.slots.clear_internal();
        self.slots.set_internal(Param::SvfCutoff, svf);
        self.slots.set_internal(Param::LpfCutoff, lpf);
        matrix.apply(&self.sources, &mut self.slots);
    }

    fn render_oscillators(&mut self) {
        let selection = self.selection;
        let count = self.unison.count();
        let color = self.value(Param::NoiseColor);
        let levels = OSC_LEVELS.map(|p| self.value(p));
        let lerps = [
            &mut self.saw_level,
            &mut self.pulse_level,
            &mut self.sine_level,
            &mut self.noise_level,
        ];
        for (lerp, level) in lerps.into_iter().zip(levels) {
            lerp.set_target(level, BLOCK_SIZE_OS);
        }
        let pre_filter_gain = db_to_linear(self.value(Param::AegPreFilterGain));
        self.pre_filter_gain.set_target(pre_filter_gain, BLOCK_SIZE_OS);

        let mut left = [0.0; BLOCK_SIZE_OS];
        let mut right = [0.0; BLOCK_SIZE_OS];
        let mut mono = [0.0; BLOCK_SIZE_OS];
        let mut gain = [0.0; BLOCK_SIZE_OS];

        if selection.saw {
            level_curve(&mut self.saw_level, &mut gain);
            for (i, saw) in self.saws[..count].iter_mut().enumerate() {
                let level = self.unison.level[i];
                let (pan_left, pan_right) = (self.unison.pan_left[i], self.unison.pan_right[i]);
                for ((l, r), g) in left.iter_mut().zip(&mut right).zip(&gain) {
                    let [y] = saw.process([]);
                    let y = g * level * y;
                    *l += pan_left * y;
                    *r += pan_right * y;
                }
            }
        }
        if selection.pulse {
            level_curve(&mut self.pulse_level, &mut gain);
            for (m, g) in mono.iter_mut().zip(&gain) {
                let [y] = self.pulse.process([]);
                *m += g * y;
            }
        }
        if selection.sine {
            level_curve(&mut self.sine_level, &mut gain);
            for (m, g) in mono.iter_mut().zip(&gain) {
                let [y] = self.sine.process([]);
                *m += g * y;
            }
        }
        if selection.noise {
            level_curve(&mut self.noise_level, &mut gain);
            for (m, g) in mono.iter_mut().zip(&gain) {
                *m += g * self.noise.next_sample(color);
            }
        }

        for (i, out) in self.output.iter_mut().enumerate() {
            let g = self.pre_filter_gain.next_value();
            *out = Lanes::from_lanes(&[g * (left[i] + mono[i]), g * (right[i] + mono[i])]);
        }
    }

    fn render_filters(&mut self) {
        let selection = self.selection;
        let sensitivity = self.value(Param::AegVelocitySens);
        let velocity_gain = 1.0 - sensitivity + sensitivity * self.velocity;
        let drive = Lanes::splat(db_to_linear(self.value(Param::WsDrive)));
        let amplitude = self.aeg.output_block();

        for (out, env) in self.output.iter_mut().zip(amplitude) {
            let mut y = *out;
            if selection.svf {
                y = self.svf.process([y])[0];
            }
            if selection.waveshaper {
                y = self.waveshaper.process(y, drive);
            }
            if selection.lpf {
                y = self.quad.process([y])[0];
            }
            *out = y * Lanes::splat(env * velocity_gain);
        }
    }

    /// Render one oversampled block of [`BLOCK_SIZE_OS`] samples. Inactive voices output silence.
    ///
    /// The base frequency is looked up again from the tuning provider on every block, so that
    /// tuning changes apply to held notes.
    #[profiling::function]
    pub fn render_block(
        &mut self,
        matrix: &ModMatrix,
        tuning: &dyn TuningProvider,
    ) -> &[Lanes; BLOCK_SIZE_OS] {
        if !self.active {
            self.output.fill(Lanes::splat(0.0));
            return &self.output;
        }

        self.update_modulation(matrix);
        self.base_frequency = base_frequency(tuning, self.address.key, self.address.channel);
        self.recalc_filters();
        self.recalc_pitch();
        self.render_oscillators();
        self.render_filters();
        &self.output
    }
}

impl DSPMeta for SynthVoice {
    type Sample = Lanes;

    /// Change the host sample rate; the voice keeps running at [`OVERSAMPLE`] times that rate.
    fn set_samplerate(&mut self, samplerate: f32) {
        let samplerate = samplerate * OVERSAMPLE as f32;
        self.samplerate = samplerate;
        for saw in &mut self.saws {
            saw.set_samplerate(samplerate);
        }
        self.pulse.set_samplerate(samplerate);
        self.sine.set_samplerate(samplerate);
        self.svf.set_samplerate(samplerate);
        self.quad.set_samplerate(samplerate);
        self.aeg.set_samplerate(samplerate);
        self.feg.set_samplerate(samplerate);
        for lfo in &mut self.lfos {
            lfo.set_samplerate(samplerate, BLOCK_SIZE_OS);
        }
    }

    /// Hard stop: silence the voice and free it without a release.
    fn reset(&mut self) {
        self.deactivate();
        self.aeg.reset();
        self.feg.reset();
        self.svf.reset();
        self.quad.reset();
        self.waveshaper.init(self.waveshaper.kind());
        self.output.fill(Lanes::splat(0.0));
    }
}
