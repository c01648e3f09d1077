//! End-to-end analysis tests
//!
//! Runs the full stack: provisioned plugin files, bootstrap, and the
//! Symphonia-backed engine decoding WAV fixtures written with hound.

use soul_audio::SymphoniaEngine;
use soul_core::{AudioEngine, ProgressCallback};
use soul_engine::{
    CancellationToken, EngineBootstrap, EngineConfig, GainAnalyzer, TempoAnalyzer, TempoOptions,
    NOT_IN_CATALOG,
};
use soul_native::{libraries, EmbeddedBundle, LibraryProvisioner, ProvisionerConfig};
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ===== Test Helpers =====

fn write_mono_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

fn sine(frequency: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    let period = 60.0 / bpm * sample_rate as f32;
    let click_len = (0.02 * sample_rate as f32) as usize;
    let mut samples = vec![0.0_f32; total];

    let mut beat = 0.0_f32;
    while (beat as usize) < total {
        let start = beat as usize;
        for i in 0..click_len.min(total - start) {
            let t = i as f32 / sample_rate as f32;
            samples[start + i] = 0.8 * (-t * 200.0).exp() * (2.0 * PI * 1000.0 * t).sin();
        }
        beat += period;
    }
    samples
}

/// A bootstrapped reference engine; `skip` stems are left out of the bundle
struct Harness {
    engine: Arc<SymphoniaEngine>,
    bootstrap: EngineBootstrap,
    _native: tempfile::TempDir,
}

impl Harness {
    fn with_config(skip: &[&str], config: EngineConfig) -> Self {
        let native = tempfile::tempdir().unwrap();
        let mut bundle = EmbeddedBundle::new("Soul");
        for stem in std::iter::once(&libraries::ENGINE).chain(libraries::FORMAT_PLUGINS) {
            if !skip.contains(stem) {
                bundle = bundle.with_library(
                    &libraries::file_name(stem),
                    format!("{} binary", stem).into_bytes(),
                );
            }
        }
        let provisioner = LibraryProvisioner::new(
            ProvisionerConfig {
                temp_root: native.path().to_path_buf(),
                module_version: "test".to_string(),
                ..ProvisionerConfig::default()
            },
            bundle,
        );

        let engine = Arc::new(SymphoniaEngine::new());
        let bootstrap = EngineBootstrap::new(
            Arc::clone(&engine) as Arc<dyn AudioEngine>,
            provisioner,
            config,
        );
        Self {
            engine,
            bootstrap,
            _native: native,
        }
    }

    fn ready(skip: &[&str]) -> Self {
        let harness = Self::with_config(skip, EngineConfig::default());
        assert!(harness.bootstrap.initialize().success);
        harness
    }

    fn dyn_engine(&self) -> Arc<dyn AudioEngine> {
        Arc::clone(self.bootstrap.engine())
    }
}

// ===== Bootstrap with the reference engine =====

#[tokio::test]
async fn test_bootstrap_loads_shipped_plugins() {
    let config = EngineConfig {
        exclusive_mode: true,
        ..EngineConfig::default()
    };
    let harness = Harness::with_config(&["bassopus"], config);

    let report = harness.bootstrap.initialize();
    assert!(report.success);
    // The reference engine has no exclusive output
    assert!(!report.exclusive_ready);
    assert_eq!(report.warnings.len(), 1);
    report.plugins.wait().await;

    let failed = report.plugins.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "bassopus");
    assert_eq!(failed[0].reason, NOT_IN_CATALOG);
    assert_eq!(report.plugins.loaded().len(), 7);

    let flac = report
        .plugins
        .loaded()
        .into_iter()
        .find(|p| p.name == "bassflac")
        .unwrap();
    assert_eq!(flac.formats[0].extensions, vec!["flac".to_string()]);

    // Search path is cleared once loading was dispatched
    assert_eq!(harness.engine.search_path(), None);

    harness.bootstrap.shutdown();
    assert_eq!(harness.engine.open_streams(), 0);
}

// ===== Gain =====

#[test]
fn test_gain_of_thirty_second_tone() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_mono_wav(&path, 44100, &sine(1000.0, 0.25, 30.0, 44100));

    let analyzer = GainAnalyzer::new(harness.dyn_engine());
    let result = analyzer.measure(&path, None, None);

    assert!(result.success, "{:?}", result.error_message);
    assert!((result.track_gain_db - (-18.0 - result.integrated_lufs)).abs() < 1e-9);
    assert!(result.true_peak_linear > 0.0);
    // Quarter-scale 1 kHz sine: about -15 LUFS
    assert!(
        (result.integrated_lufs - -15.05).abs() < 0.5,
        "integrated {}",
        result.integrated_lufs
    );
    assert!(result.loudness_range_lu < 1.0);

    assert_eq!(harness.engine.open_streams(), 0);
    assert_eq!(harness.engine.active_scans(), 0);
}

#[test]
fn test_gain_cancellation_releases_everything() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_mono_wav(&path, 44100, &sine(440.0, 0.5, 10.0, 44100));

    let token = CancellationToken::new();
    let sink_token = token.clone();
    // Cancel as soon as the first chunk has been reported
    let sink: ProgressCallback = Arc::new(move |value| {
        if value > 0.1 {
            sink_token.cancel();
        }
    });

    let analyzer = GainAnalyzer::new(harness.dyn_engine());
    let result = analyzer.measure(&path, Some(sink.as_ref()), Some(&token));

    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("Analysis cancelled"));
    assert_eq!(harness.engine.open_streams(), 0);
    assert_eq!(harness.engine.active_scans(), 0);
}

#[test]
fn test_gain_of_missing_file_fails() {
    let harness = Harness::ready(&[]);
    let result = GainAnalyzer::new(harness.dyn_engine()).measure(
        Path::new("/nonexistent/track.wav"),
        None,
        None,
    );
    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("not found"));
}

#[test]
fn test_gain_of_silence_fails() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("silence.wav");
    write_mono_wav(&path, 44100, &vec![0.0; 44100 * 5]);

    let result = GainAnalyzer::new(harness.dyn_engine()).measure(&path, None, None);
    assert!(!result.success);
    assert_eq!(harness.engine.open_streams(), 0);
}

#[test]
fn test_plugin_format_needs_its_plugin() {
    // Without bassflac, a .flac file is refused by the engine before probing
    let harness = Harness::ready(&["bassflac"]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.flac");
    std::fs::write(&path, b"fLaC").unwrap();

    let err = GainAnalyzer::new(harness.dyn_engine())
        .try_measure(&path, None, None)
        .unwrap_err();
    assert_eq!(err.code(), Some(soul_core::ErrorCode::FileForm));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_gain_analyses() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let quiet = dir.path().join("quiet.wav");
    let loud = dir.path().join("loud.wav");
    write_mono_wav(&quiet, 44100, &sine(1000.0, 0.1, 5.0, 44100));
    write_mono_wav(&loud, 44100, &sine(1000.0, 0.5, 5.0, 44100));

    let analyzer = GainAnalyzer::new(harness.dyn_engine());
    let (quiet, loud) = tokio::join!(
        analyzer.measure_async(quiet, None, None),
        analyzer.measure_async(loud, None, None)
    );

    assert!(quiet.success && loud.success);
    // 14 dB apart in amplitude
    assert!((quiet.track_gain_db - loud.track_gain_db - 13.98).abs() < 0.2);
    assert_eq!(harness.engine.open_streams(), 0);
}

// ===== Tempo =====

#[test]
fn test_tempo_of_click_track() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_mono_wav(&path, 44100, &click_track(120.0, 30.0, 44100));

    let analyzer = TempoAnalyzer::with_options(
        harness.dyn_engine(),
        TempoOptions {
            step_delay: Duration::from_millis(1),
            ..TempoOptions::default()
        },
    );
    let result = analyzer.detect(&path, None, None);

    let bpm = result.bpm.expect("click track has a tempo");
    assert!((bpm - 120.0).abs() <= 2.0, "detected {} BPM", bpm);
    assert_eq!(bpm.fract(), 0.0);
    assert_eq!(harness.engine.open_streams(), 0);
}

#[test]
fn test_tempo_of_steady_tone_is_absent() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_mono_wav(&path, 44100, &sine(440.0, 0.5, 10.0, 44100));

    let analyzer = TempoAnalyzer::with_options(
        harness.dyn_engine(),
        TempoOptions {
            step_delay: Duration::ZERO,
            ..TempoOptions::default()
        },
    );
    assert_eq!(analyzer.detect(&path, None, None).bpm, None);
    assert_eq!(harness.engine.open_streams(), 0);
}

#[tokio::test]
async fn test_tempo_cancellation_is_absent() {
    let harness = Harness::ready(&[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_mono_wav(&path, 44100, &click_track(120.0, 20.0, 44100));

    let token = CancellationToken::new();
    token.cancel();

    let analyzer = TempoAnalyzer::with_options(
        harness.dyn_engine(),
        TempoOptions {
            step_delay: Duration::ZERO,
            ..TempoOptions::default()
        },
    );
    let result = analyzer.detect_async(path, None, Some(token)).await;

    assert_eq!(result.bpm, None);
    assert_eq!(harness.engine.open_streams(), 0);
}
