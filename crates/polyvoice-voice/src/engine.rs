//! # Engine
//!
//! Audio-thread owner of the voice manager. The control context talks to it through an
//! [`EngineHandle`]: base parameter values are written as atomics, everything else goes through a
//! wait-free single-producer single-consumer queue drained before each internal block.
//!
//! Host buffers of any length are rendered in internal blocks of [`BLOCK_SIZE`] samples; samples
//! of a block not consumed by one call to [`Engine::process`] are carried over to the next.
use std::sync::Arc;

use polyvoice_core::dsp::DSPMeta;
use polyvoice_core::parameter::{ParamName, SharedParams};
use portable_atomic::{AtomicF32, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::config::{EngineConfig, MpeSettings};
use crate::error::EngineError;
use crate::events::NoteEvent;
use crate::manager::{VoiceHandle, VoiceManager};
use crate::modmatrix::{ModMatrix, ModRouting, ModSource, NUM_ROUTINGS};
use crate::params::Param;
use crate::tuning::TuningProvider;
use crate::{NoteAddress, StereoBlock, BLOCK_SIZE};

const NUM_CHANNELS: usize = 16;
const VU_FALLOFF: f32 = 0.95;

/// Atomic copy of a modulation matrix row.
#[derive(Debug, Default)]
struct RoutingSnapshot {
    source: AtomicI32,
    via: AtomicI32,
    target: AtomicI32,
    depth: AtomicF32,
}

impl RoutingSnapshot {
    fn store(&self, routing: &ModRouting) {
        let target = routing.target.map_or(-1, |p| p.into_id() as i32);
        self.source.store(routing.source.index(), Ordering::Relaxed);
        self.via.store(routing.via.index(), Ordering::Relaxed);
        self.target.store(target, Ordering::Relaxed);
        self.depth.store(routing.depth, Ordering::Relaxed);
    }

    fn load(&self) -> ModRouting {
        let target = self.target.load(Ordering::Relaxed);
        ModRouting {
            source: ModSource::from_index(self.source.load(Ordering::Relaxed)),
            via: ModSource::from_index(self.via.load(Ordering::Relaxed)),
            target: usize::try_from(target).ok().and_then(Param::try_from_id),
            depth: self.depth.load(Ordering::Relaxed),
        }
    }
}

/// State published by the audio thread for display. Values are eventually consistent with each
/// other.
#[derive(Debug, Default)]
pub struct UiSnapshot {
    update_count: AtomicU64,
    polyphony: AtomicUsize,
    vu: [AtomicF32; 2],
    matrix: [RoutingSnapshot; NUM_ROUTINGS],
}

impl UiSnapshot {
    /// Number of blocks rendered since the engine was created.
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Relaxed)
    }

    /// Number of active voices.
    pub fn polyphony(&self) -> usize {
        self.polyphony.load(Ordering::Relaxed)
    }

    /// Peak meter of the left and right outputs, with falloff.
    pub fn vu(&self) -> [f32; 2] {
        [
            self.vu[0].load(Ordering::Relaxed),
            self.vu[1].load(Ordering::Relaxed),
        ]
    }

    /// Copy of a row of the modulation matrix, as last seen by the audio thread.
    pub fn routing(&self, row: usize) -> Option<ModRouting> {
        self.matrix.get(row).map(RoutingSnapshot::load)
    }
}

/// Last channel-wide controller values, applied to notes starting on that channel.
#[derive(Debug, Copy, Clone)]
struct ChannelState {
    pitch_bend: u16,
    pressure: u8,
    mod_wheel: u8,
    timbre: u8,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            pitch_bend: 8192,
            pressure: 0,
            mod_wheel: 0,
            timbre: 0,
        }
    }
}

fn channel_pattern(channel: i16) -> NoteAddress {
    NoteAddress::new(-1, channel, -1, -1)
}

/// Control-side handle of an [`Engine`].
#[derive(Debug)]
pub struct EngineHandle {
    producer: Producer<NoteEvent>,
    params: Arc<SharedParams<Param>>,
    ui: Arc<UiSnapshot>,
}

impl EngineHandle {
    /// Send an event to the audio thread. It applies before the next block renders.
    pub fn send(&mut self, event: NoteEvent) -> Result<(), EngineError> {
        self.producer
            .push(event)
            .map_err(|_| EngineError::QueueFull)
    }

    /// Set the base value of a parameter, clamped into its range.
    pub fn set_param(&self, param: Param, value: f32) {
        self.params.set(param, param.clamp(value));
    }

    /// Shared base values of the parameters.
    pub fn params(&self) -> &Arc<SharedParams<Param>> {
        &self.params
    }

    /// State published by the audio thread.
    pub fn ui(&self) -> &Arc<UiSnapshot> {
        &self.ui
    }
}

/// Polyphonic synth engine.
#[derive(Debug)]
pub struct Engine {
    manager: VoiceManager,
    matrix: ModMatrix,
    consumer: Consumer<NoteEvent>,
    ui: Arc<UiSnapshot>,
    block: StereoBlock,
    block_pos: usize,
    mpe: MpeSettings,
    channels: [ChannelState; NUM_CHANNELS],
    vu: [f32; 2],
}

impl Engine {
    /// Create a new engine from its configuration, returning it along with its control handle.
    pub fn new(
        config: &EngineConfig,
        params: Arc<SharedParams<Param>>,
        tuning: Box<dyn TuningProvider>,
    ) -> Result<(Self, EngineHandle), EngineError> {
        config.validate()?;
        let (producer, consumer) = RingBuffer::new(config.event_queue_capacity);
        let mut manager = VoiceManager::new(
            config.sample_rate,
            config.voice_capacity,
            params.clone(),
            tuning,
            config.seed,
        );
        manager.set_pitch_bend_range(config.pitch_bend_range);
        manager.set_mpe_bend_range(config.mpe.pitch_bend_range);
        let ui = Arc::new(UiSnapshot::default());
        log::debug!(
            "Engine created: {} Hz, {} voices, MPE {}",
            config.sample_rate,
            manager.capacity(),
            if config.mpe.enabled { "on" } else { "off" }
        );

        let engine = Self {
            manager,
            matrix: ModMatrix::default(),
            consumer,
            ui: ui.clone(),
            block: StereoBlock::default(),
            block_pos: BLOCK_SIZE,
            mpe: config.mpe,
            channels: [ChannelState::default(); NUM_CHANNELS],
            vu: [0.0; 2],
        };
        let handle = EngineHandle {
            producer,
            params,
            ui,
        };
        Ok((engine, handle))
    }

    /// Voice manager of the engine.
    pub fn manager(&self) -> &VoiceManager {
        &self.manager
    }

    /// Current modulation matrix.
    pub fn matrix(&self) -> &ModMatrix {
        &self.matrix
    }

    /// State published for display.
    pub fn ui(&self) -> &Arc<UiSnapshot> {
        &self.ui
    }

    /// Change the host sample rate. Playing voices are kept.
    pub fn set_samplerate(&mut self, samplerate: f32) -> Result<(), EngineError> {
        if !samplerate.is_finite() || samplerate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(samplerate));
        }
        log::debug!("Sample rate changed to {samplerate} Hz");
        self.manager.set_samplerate(samplerate);
        Ok(())
    }

    /// Stop every voice immediately and drop any carried-over samples.
    pub fn reset(&mut self) {
        self.manager.reset();
        self.block_pos = BLOCK_SIZE;
        self.vu = [0.0; 2];
    }

    /// Take the addresses of the notes which ended since the last call.
    pub fn drain_terminated(&mut self) -> impl '_ + Iterator<Item = NoteAddress> {
        self.manager.drain_terminated()
    }

    /// Render into planar stereo host buffers. Only the common length of both buffers is written.
    #[profiling::function]
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len());
        let mut written = 0;
        while written < len {
            if self.block_pos == BLOCK_SIZE {
                self.render_next_block();
            }
            let n = (BLOCK_SIZE - self.block_pos).min(len - written);
            let range = self.block_pos..self.block_pos + n;
            left[written..written + n].copy_from_slice(&self.block.left[range.clone()]);
            right[written..written + n].copy_from_slice(&self.block.right[range]);
            self.block_pos += n;
            written += n;
        }
    }

    fn render_next_block(&mut self) {
        while let Ok(event) = self.consumer.pop() {
            self.handle_event(event);
        }
        self.block = self.manager.render_block(&self.matrix);
        self.block_pos = 0;
        self.manager.retire_finished_voices();
        self.update_ui();
    }

    fn update_ui(&mut self) {
        let peak = self.block.peak();
        for ((vu, peak), slot) in self.vu.iter_mut().zip(peak).zip(&self.ui.vu) {
            *vu = peak.max(*vu * VU_FALLOFF);
            slot.store(*vu, Ordering::Relaxed);
        }
        self.ui
            .polyphony
            .store(self.manager.polyphony(), Ordering::Relaxed);
        for (snapshot, routing) in self.ui.matrix.iter().zip(self.matrix.rows()) {
            snapshot.store(routing);
        }
        self.ui.update_count.fetch_add(1, Ordering::Relaxed);
    }

    fn channel_state(&mut self, channel: i16) -> impl '_ + Iterator<Item = &mut ChannelState> {
        let range = match usize::try_from(channel) {
            Ok(c) if c < NUM_CHANNELS => c..c + 1,
            Ok(_) => 0..0,
            Err(_) => 0..NUM_CHANNELS,
        };
        self.channels[range].iter_mut()
    }

    fn route_bend(manager: &mut VoiceManager, mpe: bool, handle: VoiceHandle, value: u16) {
        if mpe {
            manager.route_channel_pitch_bend(handle, value);
        } else {
            manager.route_pitch_bend(handle, value);
        }
    }

    fn note_on(&mut self, address: NoteAddress, velocity: f32, retune: f32) {
        let same_key = NoteAddress {
            note_id: -1,
            ..address
        };
        let retrigger = self.manager.find(&same_key).any(|h| {
            self.manager
                .voice(h)
                .is_some_and(|v| v.is_gated() && v.address().note_id != address.note_id)
        });
        if retrigger {
            log::debug!("Retrigger of {address:?} with a new note id, starting another voice");
        }

        let Some(handle) = self.manager.activate(address, velocity, retune) else {
            log::debug!("Voice pool full, dropping {address:?}");
            return;
        };
        let state = usize::try_from(address.channel)
            .ok()
            .and_then(|c| self.channels.get(c).copied())
            .unwrap_or_default();
        Self::route_bend(&mut self.manager, self.mpe.enabled, handle, state.pitch_bend);
        self.manager.route_channel_pressure(handle, state.pressure);
        self.manager.route_cc(handle, 1, state.mod_wheel);
        self.manager.route_cc(handle, 74, state.timbre);
    }

    fn handle_event(&mut self, event: NoteEvent) {
        match event {
            NoteEvent::NoteOn {
                address,
                velocity,
                retune,
            } => self.note_on(address, velocity, retune),
            NoteEvent::NoteOff { address, velocity } => {
                self.manager
                    .for_each_matching(&address, |m, h| m.release(h, velocity));
            }
            NoteEvent::PolyModulation {
                address,
                param,
                value,
            } => {
                self.manager
                    .for_each_matching(&address, |m, h| m.route_modulation(h, param, value));
            }
            NoteEvent::PitchBend { channel, value } => {
                for state in self.channel_state(channel) {
                    state.pitch_bend = value;
                }
                let mpe = self.mpe.enabled;
                self.manager
                    .for_each_matching(&channel_pattern(channel), |m, h| {
                        Self::route_bend(m, mpe, h, value)
                    });
            }
            NoteEvent::NoteExpression {
                address,
                kind,
                value,
            } => {
                self.manager.for_each_matching(&address, |m, h| {
                    m.route_note_expression(h, kind, value)
                });
            }
            NoteEvent::PolyAftertouch { address, value } => {
                self.manager
                    .for_each_matching(&address, |m, h| m.route_aftertouch(h, value));
            }
            NoteEvent::ChannelPressure { channel, value } => {
                for state in self.channel_state(channel) {
                    state.pressure = value;
                }
                self.manager
                    .for_each_matching(&channel_pattern(channel), |m, h| {
                        m.route_channel_pressure(h, value)
                    });
            }
            NoteEvent::Cc { channel, cc, value } => {
                for state in self.channel_state(channel) {
                    match cc {
                        1 => state.mod_wheel = value,
                        74 => state.timbre = value,
                        _ => {}
                    }
                }
                self.manager
                    .for_each_matching(&channel_pattern(channel), |m, h| m.route_cc(h, cc, value));
            }
            NoteEvent::SetModRouting { row, routing } => {
                if !self.matrix.set(row, routing) {
                    log::debug!("Ignoring routing for out of range row {row}");
                }
            }
            NoteEvent::MpeConfig {
                enabled,
                pitch_bend_range,
            } => {
                log::debug!(
                    "MPE {}, bend range {pitch_bend_range}",
                    if enabled { "on" } else { "off" }
                );
                self.mpe = MpeSettings {
                    enabled,
                    pitch_bend_range,
                };
                self.manager.set_mpe_bend_range(pitch_bend_range);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::default_params;
    use crate::tuning::EqualTemperament;
    use rstest::rstest;

    fn engine(config: EngineConfig) -> (Engine, EngineHandle) {
        Engine::new(&config, default_params(), Box::new(EqualTemperament)).unwrap()
    }

    fn note_on(key: i16, note_id: i32) -> NoteEvent {
        NoteEvent::NoteOn {
            address: NoteAddress::new(0, 0, key, note_id),
            velocity: 1.0,
            retune: 0.0,
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            voice_capacity: 0,
            ..Default::default()
        };
        let result = Engine::new(&config, default_params(), Box::new(EqualTemperament));
        assert!(matches!(result, Err(EngineError::InvalidVoiceCapacity(0))));
    }

    #[test]
    fn full_queue_is_reported() {
        let (_engine, mut handle) = engine(EngineConfig {
            event_queue_capacity: 2,
            ..Default::default()
        });
        handle.send(note_on(60, 1)).unwrap();
        handle.send(note_on(62, 2)).unwrap();
        assert!(matches!(
            handle.send(note_on(64, 3)),
            Err(EngineError::QueueFull)
        ));
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(16)]
    #[case(100)]
    fn host_buffers_of_any_length(#[case] len: usize) {
        let (mut engine, mut handle) = engine(EngineConfig::default());
        handle.send(note_on(60, 1)).unwrap();
        let mut left = vec![0.0; len];
        let mut right = vec![0.0; len];
        let mut total = 0;
        for _ in 0..10 {
            engine.process(&mut left, &mut right);
            total += len;
            assert!(left.iter().chain(&right).all(|x| x.is_finite()));
        }
        let expected = total.div_ceil(BLOCK_SIZE) as u64;
        assert_eq!(expected, engine.ui().update_count());
        assert_eq!(1, engine.ui().polyphony());
    }

    #[test]
    fn events_apply_before_the_block() {
        let (mut engine, mut handle) = engine(EngineConfig::default());
        handle.set_param(Param::AegRelease, 5.0);
        handle.send(note_on(60, 1)).unwrap();
        handle
            .send(NoteEvent::NoteOff {
                address: NoteAddress::new(-1, -1, 60, -1),
                velocity: 0.0,
            })
            .unwrap();
        let mut buf = [0.0; BLOCK_SIZE];
        let mut buf2 = [0.0; BLOCK_SIZE];
        engine.process(&mut buf, &mut buf2);
        let handle = engine.manager().handle(0).unwrap();
        assert!(!engine.manager().voice(handle).unwrap().is_gated());
        assert_eq!(0, engine.drain_terminated().count());
    }

    #[test]
    fn short_release_ends_within_the_block() {
        let (mut engine, mut handle) = engine(EngineConfig::default());
        handle.set_param(Param::AegRelease, 0.0);
        handle.send(note_on(60, 1)).unwrap();
        handle
            .send(NoteEvent::NoteOff {
                address: NoteAddress::new(-1, -1, 60, -1),
                velocity: 0.0,
            })
            .unwrap();
        let mut buf = [0.0; BLOCK_SIZE];
        let mut buf2 = [0.0; BLOCK_SIZE];
        engine.process(&mut buf, &mut buf2);
        assert!(engine.manager().handle(0).is_none());
        assert_eq!(
            vec![NoteAddress::new(0, 0, 60, 1)],
            engine.drain_terminated().collect::<Vec<_>>()
        );
    }

    #[test]
    fn channel_bend_applies_to_new_notes() {
        let (mut engine, mut handle) = engine(EngineConfig::default());
        handle
            .send(NoteEvent::PitchBend {
                channel: 0,
                value: 0,
            })
            .unwrap();
        handle.send(note_on(60, 1)).unwrap();
        let mut l = [0.0; BLOCK_SIZE];
        let mut r = [0.0; BLOCK_SIZE];
        engine.process(&mut l, &mut r);
        let voice = engine
            .manager()
            .handle(0)
            .and_then(|h| engine.manager().voice(h))
            .unwrap();
        assert_eq!(-2.0, voice.pitch_offset());
    }

    #[test]
    fn mpe_bend_uses_mpe_range() {
        let (mut engine, mut handle) = engine(EngineConfig::default());
        handle
            .send(NoteEvent::MpeConfig {
                enabled: true,
                pitch_bend_range: 24.0,
            })
            .unwrap();
        handle.send(note_on(60, 1)).unwrap();
        handle
            .send(NoteEvent::PitchBend {
                channel: 0,
                value: 12288,
            })
            .unwrap();
        let mut l = [0.0; BLOCK_SIZE];
        let mut r = [0.0; BLOCK_SIZE];
        engine.process(&mut l, &mut r);
        let voice = engine
            .manager()
            .handle(0)
            .and_then(|h| engine.manager().voice(h))
            .unwrap();
        assert_eq!(12.0, voice.pitch_offset());
    }

    #[test]
    fn matrix_rows_are_published() {
        let (mut engine, mut handle) = engine(EngineConfig::default());
        let routing = ModRouting {
            source: ModSource::ModWheel,
            via: ModSource::None,
            target: Some(Param::SvfCutoff),
            depth: 24.0,
        };
        handle
            .send(NoteEvent::SetModRouting { row: 3, routing })
            .unwrap();
        let mut l = [0.0; BLOCK_SIZE];
        let mut r = [0.0; BLOCK_SIZE];
        engine.process(&mut l, &mut r);
        assert_eq!(Some(routing), engine.ui().routing(3));
        assert_eq!(Some(ModRouting::default()), engine.ui().routing(0));
        assert_eq!(None, engine.ui().routing(NUM_ROUTINGS));
    }

    #[test]
    fn set_param_clamps() {
        let (_engine, handle) = engine(EngineConfig::default());
        handle.set_param(Param::SvfResonance, 3.0);
        assert_eq!(1.0, handle.params().get(Param::SvfResonance));
    }
}
