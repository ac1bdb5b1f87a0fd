//! # Voice manager
//!
//! Fixed pool of [`SynthVoice`]s, allocated once. Notes take the first free slot in index order;
//! when every slot is busy the note is refused, and playing voices are never stolen.
//!
//! Voices are addressed through [`VoiceHandle`]s, whose generation changes every time the slot
//! is reused, so that events routed to a note which has since ended are dropped instead of
//! reaching an unrelated note.
use std::fmt;
use std::sync::Arc;

use polyvoice_core::dsp::DSPMeta;
use polyvoice_core::parameter::SharedParams;
use polyvoice_core::simd::SimdValue;
use polyvoice_filters::halfband::Downsampler;

use crate::modmatrix::ModMatrix;
use crate::params::Param;
use crate::tuning::TuningProvider;
use crate::voice::{NoteExpression, SynthVoice};
use crate::{Lanes, NoteAddress, StereoBlock, BLOCK_SIZE, BLOCK_SIZE_OS, MAX_VOICES};

/// Handle to a voice of the pool, valid for the duration of one note.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    slot: usize,
    generation: u32,
}

impl VoiceHandle {
    /// Slot of the voice in the pool.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Convert a 14-bit pitch bend value (8192 at rest) into semitones.
pub fn bend_to_semitones(value: u16, range: f32) -> f32 {
    let normalized = (value.min(0x3FFF) as f32 - 8192.0) / 8192.0;
    normalized * range
}

fn midi_to_unit(value: u8) -> f32 {
    value.min(127) as f32 / 127.0
}

/// Fixed-capacity polyphonic voice manager.
pub struct VoiceManager {
    voices: Box<[SynthVoice]>,
    generations: Box<[u32]>,
    tuning: Box<dyn TuningProvider>,
    downsampler: Downsampler<Lanes>,
    mix: [Lanes; BLOCK_SIZE_OS],
    terminated: Vec<NoteAddress>,
    pitch_bend_range: f32,
    mpe_bend_range: f32,
}

impl fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceManager")
            .field("voices", &self.voices)
            .field("generations", &self.generations)
            .field("tuning", &"Box<dyn TuningProvider>")
            .field("downsampler", &self.downsampler)
            .field("terminated", &self.terminated)
            .field("pitch_bend_range", &self.pitch_bend_range)
            .field("mpe_bend_range", &self.mpe_bend_range)
            .finish_non_exhaustive()
    }
}

impl VoiceManager {
    /// Create a new voice manager.
    ///
    /// # Arguments
    ///
    /// * `samplerate`: Host sample rate
    /// * `capacity`: Number of voices, clamped into `1..=MAX_VOICES`
    /// * `params`: Shared base values of the parameters
    /// * `tuning`: Tuning provider consulted for the base frequency of every note
    /// * `seed`: Seed from which each voice's random generators are seeded
    pub fn new(
        samplerate: f32,
        capacity: usize,
        params: Arc<SharedParams<Param>>,
        tuning: Box<dyn TuningProvider>,
        seed: u64,
    ) -> Self {
        let capacity = capacity.clamp(1, MAX_VOICES);
        let mut rng = fastrand::Rng::with_seed(seed);
        Self {
            voices: (0..capacity)
                .map(|_| SynthVoice::new(samplerate, params.clone(), rng.u64(..)))
                .collect(),
            generations: vec![0; capacity].into_boxed_slice(),
            tuning,
            downsampler: Downsampler::default(),
            mix: [Lanes::splat(0.0); BLOCK_SIZE_OS],
            terminated: Vec::with_capacity(2 * MAX_VOICES),
            pitch_bend_range: 2.0,
            mpe_bend_range: 24.0,
        }
    }

    /// Number of voices in the pool.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Number of active voices.
    pub fn polyphony(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Set the range of channel-wide pitch bends, in semitones.
    pub fn set_pitch_bend_range(&mut self, semitones: f32) {
        self.pitch_bend_range = semitones;
    }

    /// Set the range of MPE pitch bends, in semitones.
    pub fn set_mpe_bend_range(&mut self, semitones: f32) {
        self.mpe_bend_range = semitones;
    }

    /// Replace the tuning provider. Playing notes pick it up at their next block.
    pub fn set_tuning(&mut self, tuning: Box<dyn TuningProvider>) {
        self.tuning = tuning;
    }

    /// Start a note on the first free voice.
    ///
    /// Returns `None` when every voice is busy; the note is then dropped.
    pub fn activate(
        &mut self,
        address: NoteAddress,
        velocity: f32,
        retune: f32,
    ) -> Option<VoiceHandle> {
        let Some(slot) = self.voices.iter().position(|v| !v.is_active()) else {
            log::trace!("No free voice for {address:?}, note refused");
            return None;
        };
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.voices[slot].start(address, velocity, retune, self.tuning.as_ref());
        Some(VoiceHandle {
            slot,
            generation: self.generations[slot],
        })
    }

    /// Handle of the active voice in this slot, if any.
    pub fn handle(&self, slot: usize) -> Option<VoiceHandle> {
        let voice = self.voices.get(slot)?;
        voice.is_active().then(|| VoiceHandle {
            slot,
            generation: self.generations[slot],
        })
    }

    /// Voice of a handle, or `None` if the handle is stale.
    pub fn voice(&self, handle: VoiceHandle) -> Option<&SynthVoice> {
        let voice = self.voices.get(handle.slot)?;
        (voice.is_active() && self.generations[handle.slot] == handle.generation).then_some(voice)
    }

    fn voice_mut(&mut self, handle: VoiceHandle) -> Option<&mut SynthVoice> {
        let generation = *self.generations.get(handle.slot)?;
        let voice = self.voices.get_mut(handle.slot)?;
        (voice.is_active() && generation == handle.generation).then_some(voice)
    }

    /// Iterate over the handles of active voices whose address matches the pattern.
    pub fn find<'a>(&'a self, pattern: &'a NoteAddress) -> impl 'a + Iterator<Item = VoiceHandle> {
        (0..self.capacity())
            .filter_map(move |slot| self.handle(slot))
            .filter(move |h| self.voices[h.slot].address().matches(pattern))
    }

    /// Call `f` with the handle of every active voice matching the pattern.
    pub fn for_each_matching(
        &mut self,
        pattern: &NoteAddress,
        mut f: impl FnMut(&mut Self, VoiceHandle),
    ) {
        for slot in 0..self.capacity() {
            let Some(handle) = self.handle(slot) else {
                continue;
            };
            if self.voices[slot].address().matches(pattern) {
                f(self, handle);
            }
        }
    }

    /// Release a note. The voice keeps its slot until it has decayed.
    pub fn release(&mut self, handle: VoiceHandle, velocity: f32) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.release(velocity);
        }
    }

    /// Set the external modulation of a parameter on a voice.
    pub fn route_modulation(&mut self, handle: VoiceHandle, param: Param, value: f32) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.apply_external_mod(param, value);
        }
    }

    /// Apply a channel-wide 14-bit pitch bend to a voice, using the pitch bend range.
    pub fn route_pitch_bend(&mut self, handle: VoiceHandle, value: u16) {
        let semitones = bend_to_semitones(value, self.pitch_bend_range);
        if let Some(voice) = self.voice_mut(handle) {
            voice.set_pitch_bend(semitones);
        }
    }

    /// Apply an MPE 14-bit pitch bend to a voice, using the MPE pitch bend range.
    pub fn route_channel_pitch_bend(&mut self, handle: VoiceHandle, value: u16) {
        let semitones = bend_to_semitones(value, self.mpe_bend_range);
        if let Some(voice) = self.voice_mut(handle) {
            voice.set_mpe_bend(semitones);
        }
    }

    /// Forward a note expression to a voice.
    pub fn route_note_expression(&mut self, handle: VoiceHandle, kind: NoteExpression, value: f32) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.receive_note_expression(kind, value);
        }
    }

    /// Apply a 7-bit polyphonic aftertouch value to a voice.
    pub fn route_aftertouch(&mut self, handle: VoiceHandle, value: u8) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.set_poly_aftertouch(midi_to_unit(value));
        }
    }

    /// Apply a 7-bit channel pressure value to a voice.
    pub fn route_channel_pressure(&mut self, handle: VoiceHandle, value: u8) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.set_channel_pressure(midi_to_unit(value));
        }
    }

    /// Apply a 7-bit MIDI CC value to a voice.
    pub fn route_cc(&mut self, handle: VoiceHandle, cc: u8, value: u8) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.apply_cc(cc, midi_to_unit(value));
        }
    }

    /// Render every active voice, sum them and decimate the mix down to the host rate.
    #[profiling::function]
    pub fn render_block(&mut self, matrix: &ModMatrix) -> StereoBlock {
        self.mix.fill(Lanes::splat(0.0));
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            let out = voice.render_block(matrix, self.tuning.as_ref());
            for (acc, x) in self.mix.iter_mut().zip(out) {
                *acc = *acc + *x;
            }
        }

        let mut decimated = [Lanes::splat(0.0); BLOCK_SIZE];
        self.downsampler.process_block(&self.mix, &mut decimated);
        let mut block = StereoBlock::default();
        for ((left, right), y) in block.left.iter_mut().zip(&mut block.right).zip(decimated) {
            *left = y.extract(0);
            *right = y.extract(1);
        }
        block
    }

    /// Free the voices which have decayed to silence after their release, recording their
    /// addresses in the terminated notes list.
    pub fn retire_finished_voices(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.is_finished()) {
            voice.deactivate();
            let address = voice.address();
            log::trace!("Voice for {address:?} finished");
            if self.terminated.len() < self.terminated.capacity() {
                self.terminated.push(address);
            }
        }
    }

    /// Take the addresses of the notes which ended since the last call.
    pub fn drain_terminated(&mut self) -> impl '_ + Iterator<Item = NoteAddress> {
        self.terminated.drain(..)
    }
}

impl DSPMeta for VoiceManager {
    type Sample = Lanes;

    fn set_samplerate(&mut self, samplerate: f32) {
        for voice in self.voices.iter_mut() {
            voice.set_samplerate(samplerate);
        }
        self.downsampler.reset();
    }

    /// Latency of the decimator, in host samples.
    fn latency(&self) -> usize {
        self.downsampler.latency() / 2
    }

    /// Stop every voice immediately.
    fn reset(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.reset();
        }
        self.downsampler.reset();
        self.terminated.clear();
    }
}
