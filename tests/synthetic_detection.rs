//! Integration tests for tempo, key and chord detection on synthesized audio.

use harmony_probe::{
    AnalysisConfig, AnalysisError, ChordDetector, ChordKind, ChromagramEngine, KeyDetector, Mode,
    NoteName, SignalView, SpectrumEngine, TempoDetector,
};
use lazy_static::lazy_static;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

const SAMPLE_RATE: u32 = 44_100;

const C_MAJOR: [f32; 3] = [261.63, 329.63, 392.00];
const F_MAJOR: [f32; 3] = [349.23, 440.00, 523.25];
const G_MAJOR: [f32; 3] = [392.00, 493.88, 587.33];
const A_MINOR: [f32; 3] = [220.00, 261.63, 329.63];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Equal-amplitude sine mix, peak-normalized to 0.9.
fn sine_mix(freqs: &[f32], seconds: f32) -> Vec<f32> {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    let scale = 0.9 / freqs.len() as f32;
    (0..len)
        .map(|n| {
            let t = n as f32 / SAMPLE_RATE as f32;
            freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() * scale
        })
        .collect()
}

/// Decaying impulse every `period` samples starting at sample 0.
fn impulse_train(period: usize, len: usize) -> Vec<f32> {
    let mut samples = vec![0.0; len];
    for start in (0..len).step_by(period) {
        for (n, s) in samples[start..].iter_mut().take(512).enumerate() {
            *s = (-(n as f32) / 64.0).exp();
        }
    }
    samples
}

/// Deterministic uniform noise in [-amp, amp].
fn noise(len: usize, amp: f32) -> Vec<f32> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32 * 2.0 - 1.0) * amp
        })
        .collect()
}

lazy_static! {
    static ref PROGRESSION: Vec<f32> = [C_MAJOR, F_MAJOR, G_MAJOR, C_MAJOR]
        .iter()
        .flat_map(|triad| sine_mix(triad, 1.0))
        .collect();
    static ref C_MAJOR_TONE: Vec<f32> = sine_mix(&C_MAJOR, 3.0);
    static ref A_MINOR_TONE: Vec<f32> = sine_mix(&A_MINOR, 3.0);
    static ref CLICKS_120: Vec<f32> = impulse_train(22_050, 4 * SAMPLE_RATE as usize);
}

#[test]
fn tempo_of_half_second_impulses_is_120() {
    init_logger();
    let signal = SignalView::mono(&CLICKS_120, SAMPLE_RATE);
    let tempo = TempoDetector::default().detect_tempo(&signal).unwrap();
    assert!(
        (tempo.bpm - 120.0).abs() <= 1.0,
        "BPM should be close to 120, got {:.2}",
        tempo.bpm
    );
    assert!(tempo.confidence > 0.5, "confidence {:.2}", tempo.confidence);
}

#[test]
fn silence_and_noise_have_no_tempo() {
    init_logger();
    let detector = TempoDetector::default();
    for samples in [vec![0.0; 4 * SAMPLE_RATE as usize], noise(4 * SAMPLE_RATE as usize, 0.5)] {
        let err = detector
            .detect_tempo(&SignalView::mono(&samples, SAMPLE_RATE))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoDetection(_)), "{err}");
    }
}

#[test]
fn c_major_triad_is_c_major() {
    init_logger();
    let key = KeyDetector::default()
        .detect_key(&SignalView::mono(&C_MAJOR_TONE, SAMPLE_RATE))
        .unwrap();
    assert_eq!((key.tonic, key.mode), (NoteName::C, Mode::Major), "{}", key.label());
    assert!(key.confidence > 0.5 && key.confidence <= 0.95);
}

#[test]
fn a_minor_triad_is_a_minor() {
    init_logger();
    let key = KeyDetector::default()
        .detect_key(&SignalView::mono(&A_MINOR_TONE, SAMPLE_RATE))
        .unwrap();
    assert_eq!((key.tonic, key.mode), (NoteName::A, Mode::Minor), "{}", key.label());
    assert!(key.confidence > 0.5 && key.confidence <= 0.95);
}

#[test]
fn stereo_triad_matches_mono() {
    let signal = SignalView::new(vec![&C_MAJOR_TONE[..], &C_MAJOR_TONE[..]], SAMPLE_RATE);
    let stereo = KeyDetector::default().detect_key(&signal).unwrap();
    let mono = KeyDetector::default()
        .detect_key(&SignalView::mono(&C_MAJOR_TONE, SAMPLE_RATE))
        .unwrap();
    assert_eq!((stereo.tonic, stereo.mode), (mono.tonic, mono.mode));
}

#[test]
fn progression_c_f_g_c() {
    init_logger();
    let signal = SignalView::mono(&PROGRESSION, SAMPLE_RATE);
    let chords = ChordDetector::default().detect_chords(&signal).unwrap();
    assert_eq!(chords, vec!["C", "F", "G", "C"]);
}

#[test]
fn progression_events_are_timed() {
    let signal = SignalView::mono(&PROGRESSION, SAMPLE_RATE);
    let events = ChordDetector::default().detect_chord_events(&signal).unwrap();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.quality == ChordKind::Major));
    assert_eq!(events[1].root, NoteName::F);

    for pair in events.windows(2) {
        assert!(pair[0].start_time + pair[0].duration <= pair[1].start_time + 1e-3);
    }
    for (i, event) in events.iter().enumerate() {
        assert!(
            (event.start_time - i as f32).abs() < 0.15,
            "event {i} starts at {:.3}",
            event.start_time
        );
        assert!(event.duration > 0.8 && event.duration < 1.1);
    }
}

#[test]
fn silent_signal_has_no_chords() {
    let samples = vec![0.0; 2 * SAMPLE_RATE as usize];
    let err = ChordDetector::default()
        .detect_chords(&SignalView::mono(&samples, SAMPLE_RATE))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NoDetection(_)));

    let err = KeyDetector::default()
        .detect_key(&SignalView::mono(&samples, SAMPLE_RATE))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NoDetection(_)));
}

#[test]
fn degenerate_inputs_are_invalid_before_framing() {
    let empty: Vec<f32> = Vec::new();
    // shorter than any frame, so framing would have failed differently
    let short = vec![0.3f32; 16];

    let inputs = [
        SignalView::new(Vec::new(), SAMPLE_RATE),
        SignalView::mono(&empty, SAMPLE_RATE),
        SignalView::mono(&short, 0),
    ];

    for signal in &inputs {
        let tempo = TempoDetector::default().detect_tempo(signal).unwrap_err();
        let key = KeyDetector::default().detect_key(signal).unwrap_err();
        let chords = ChordDetector::default().detect_chords(signal).unwrap_err();
        for err in [tempo, key, chords] {
            assert!(matches!(err, AnalysisError::InvalidInput(_)), "{err}");
        }
    }
}

#[test]
fn short_signal_is_insufficient() {
    let short = vec![0.3f32; 512];
    let signal = SignalView::mono(&short, SAMPLE_RATE);

    let errors = [
        TempoDetector::default().detect_tempo(&signal).unwrap_err(),
        KeyDetector::default().detect_key(&signal).unwrap_err(),
        ChordDetector::default().detect_chords(&signal).unwrap_err(),
    ];
    for err in errors {
        assert!(
            matches!(err, AnalysisError::InsufficientSignal { available: 512, .. }),
            "{err}"
        );
    }
}

#[test]
fn chromagrams_stay_normalized() {
    let spectrum = SpectrumEngine::new(4096).unwrap();
    let engine = ChromagramEngine::builder()
        .sampling_rate(SAMPLE_RATE)
        .fft_size(4096)
        .build()
        .unwrap();

    let inputs = [
        sine_mix(&C_MAJOR, 0.1),
        sine_mix(&[55.0], 0.1),
        sine_mix(&[3_520.0, 7_000.0], 0.1),
        noise(4096, 0.8),
    ];
    for samples in &inputs {
        let chroma = engine.compute(&spectrum.magnitudes(&samples[..4096])).unwrap();
        assert_eq!(chroma.bins().len(), 12);
        assert!(chroma.bins().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn repeated_and_concurrent_calls_agree() {
    init_logger();
    let config = AnalysisConfig::default();
    let tempo = config.tempo_detector().unwrap();
    let keys = config.key_detector().unwrap();
    let chords = config.chord_detector().unwrap();

    let clicks = SignalView::mono(&CLICKS_120, SAMPLE_RATE);
    let tone = SignalView::mono(&C_MAJOR_TONE, SAMPLE_RATE);
    let progression = SignalView::mono(&PROGRESSION, SAMPLE_RATE);

    assert_eq!(
        tempo.detect_tempo(&clicks).unwrap(),
        tempo.detect_tempo(&clicks).unwrap()
    );
    assert_eq!(keys.detect_key(&tone).unwrap(), keys.detect_key(&tone).unwrap());
    let serial = chords.detect_chord_events(&progression).unwrap();
    assert_eq!(serial, chords.detect_chord_events(&progression).unwrap());

    let signals: Vec<&[f32]> = vec![&PROGRESSION[..], &C_MAJOR_TONE[..], &A_MINOR_TONE[..]];
    let mismatches = Arc::new(Mutex::new(Vec::<String>::new()));
    signals.par_iter().for_each(|samples| {
        let view = SignalView::mono(samples, SAMPLE_RATE);
        let first = (keys.detect_key(&view).unwrap(), chords.detect_chords(&view).unwrap());
        let second = (keys.detect_key(&view).unwrap(), chords.detect_chords(&view).unwrap());
        if first != second {
            mismatches
                .lock()
                .unwrap()
                .push(format!("{first:?} != {second:?}"));
        }
    });
    let mismatches = Arc::try_unwrap(mismatches).unwrap().into_inner().unwrap();
    assert!(mismatches.is_empty(), "{}", mismatches.join("\n"));
}

#[test]
fn custom_threshold_disables_chords() {
    // an unreachable correlation threshold leaves only no-chord frames
    let detector = ChordDetector::builder()
        .correlation_threshold(1.0)
        .build()
        .unwrap();
    let err = detector
        .detect_chords(&SignalView::mono(&PROGRESSION, SAMPLE_RATE))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NoDetection(_)));
}
