use std::sync::Arc;

use polyvoice_core::parameter::SharedParams;
use polyvoice_voice::config::EngineConfig;
use polyvoice_voice::engine::Engine;
use polyvoice_voice::events::NoteEvent;
use polyvoice_voice::manager::VoiceManager;
use polyvoice_voice::modmatrix::ModMatrix;
use polyvoice_voice::params::{default_params, Param};
use polyvoice_voice::tuning::EqualTemperament;
use polyvoice_voice::{NoteAddress, BLOCK_SIZE};
use rstest::rstest;

const SAMPLERATE: f32 = 48_000.0;

fn sine_only() -> Arc<SharedParams<Param>> {
    let params = default_params();
    params.set_bool(Param::SawActive, false);
    params.set_bool(Param::SinActive, true);
    params.set_bool(Param::SvfActive, false);
    params
}

fn render(manager: &mut VoiceManager, blocks: usize) -> Vec<f32> {
    let matrix = ModMatrix::default();
    let mut out = Vec::with_capacity(blocks * BLOCK_SIZE);
    for _ in 0..blocks {
        let block = manager.render_block(&matrix);
        manager.retire_finished_voices();
        out.extend_from_slice(&block.left);
    }
    out
}

/// Frequency estimated from the rising zero crossings of the signal, with linear interpolation
/// between samples.
fn zero_crossing_frequency(signal: &[f32], samplerate: f32) -> f32 {
    let crossings = signal
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, w)| i as f64 + (w[0] / (w[0] - w[1])) as f64)
        .collect::<Vec<_>>();
    assert!(crossings.len() > 2);
    let (first, last) = (crossings[0], crossings[crossings.len() - 1]);
    ((crossings.len() - 1) as f64 / (last - first) * samplerate as f64) as f32
}

#[rstest]
#[case(69, 440.0)]
#[case(60, 261.625_58)]
#[case(81, 880.0)]
fn sine_voice_plays_at_base_frequency(#[case] key: i16, #[case] expected: f32) {
    let mut manager =
        VoiceManager::new(SAMPLERATE, 1, sine_only(), Box::new(EqualTemperament), 0);
    manager
        .activate(NoteAddress::new(0, 0, key, -1), 1.0, 0.0)
        .unwrap();

    let signal = render(&mut manager, SAMPLERATE as usize / BLOCK_SIZE);
    let freq = zero_crossing_frequency(&signal[4800..], SAMPLERATE);
    assert!(
        (freq - expected).abs() / expected < 1e-3,
        "expected {expected} Hz, got {freq} Hz"
    );
}

#[test]
fn octave_and_coarse_shift_the_sine() {
    let params = sine_only();
    params.set(Param::SinOctave, 1.0);
    params.set(Param::SinCoarse, -12.0);
    params.set(Param::AegVelocitySens, 0.0);
    let mut manager = VoiceManager::new(SAMPLERATE, 1, params, Box::new(EqualTemperament), 0);
    manager
        .activate(NoteAddress::new(0, 0, 69, -1), 0.5, 0.0)
        .unwrap();

    let signal = render(&mut manager, 1500);
    let freq = zero_crossing_frequency(&signal[4800..], SAMPLERATE);
    assert!((freq - 440.0).abs() < 0.44, "{freq}");
}

#[test]
fn unknown_filter_types_pass_through() {
    let plain = sine_only();
    let unknown = sine_only();
    unknown.set_bool(Param::SvfActive, true);
    unknown.set(Param::SvfMode, 17.0);
    unknown.set_bool(Param::LpfActive, true);
    unknown.set(Param::LpfType, 42.0);
    unknown.set_bool(Param::WsActive, true);
    unknown.set(Param::WsType, -3.0);
    unknown.set(Param::WsDrive, 12.0);

    let outputs = [plain, unknown].map(|params| {
        let mut manager =
            VoiceManager::new(SAMPLERATE, 1, params, Box::new(EqualTemperament), 7);
        manager
            .activate(NoteAddress::new(0, 0, 57, -1), 0.7, 0.0)
            .unwrap();
        render(&mut manager, 200)
    });
    let [plain, unknown] = outputs;
    assert!(plain.iter().any(|x| *x != 0.0));
    assert_eq!(plain, unknown);
}

#[test]
fn full_patch_stays_finite() {
    let params = default_params();
    for p in [
        Param::PulseActive,
        Param::SinActive,
        Param::NoiseActive,
        Param::LpfActive,
        Param::WsActive,
        Param::Lfo1Active,
    ] {
        params.set_bool(p, true);
    }
    params.set(Param::SawUnisonCount, 7.0);
    params.set(Param::SvfResonance, 1.0);
    params.set(Param::LpfResonance, 1.0);
    params.set(Param::LpfType, 1.0);
    params.set(Param::WsType, 5.0);
    params.set(Param::WsDrive, 24.0);
    params.set(Param::AegPreFilterGain, 24.0);
    params.set(Param::FegToSvfCutoff, 48.0);
    params.set(Param::Lfo1Rate, 4.0);

    let mut manager = VoiceManager::new(SAMPLERATE, 8, params, Box::new(EqualTemperament), 3);
    for key in [24, 48, 72, 96, 120] {
        manager
            .activate(NoteAddress::new(0, 0, key, -1), 1.0, 0.0)
            .unwrap();
    }
    let signal = render(&mut manager, 600);
    assert!(signal.iter().all(|x| x.is_finite()));
}

#[test]
fn engine_renders_and_reports_ended_notes() {
    let config = EngineConfig::default();
    let params = sine_only();
    params.set(Param::AegRelease, 0.005);
    let (mut engine, mut handle) =
        Engine::new(&config, params, Box::new(EqualTemperament)).unwrap();
    let address = NoteAddress::new(0, 0, 69, 5);

    handle
        .send(NoteEvent::NoteOn {
            address,
            velocity: 1.0,
            retune: 0.0,
        })
        .unwrap();
    let mut left = vec![0.0; 500];
    let mut right = vec![0.0; 500];
    engine.process(&mut left, &mut right);
    assert!(left.iter().any(|x| *x != 0.0));
    assert_eq!(left, right);
    assert_eq!(1, handle.ui().polyphony());
    assert!(handle.ui().vu()[0] > 0.0);

    handle
        .send(NoteEvent::NoteOff {
            address: NoteAddress::new(-1, -1, -1, 5),
            velocity: 0.0,
        })
        .unwrap();
    for _ in 0..10 {
        engine.process(&mut left, &mut right);
    }
    assert_eq!(0, handle.ui().polyphony());
    assert_eq!(vec![address], engine.drain_terminated().collect::<Vec<_>>());
}
