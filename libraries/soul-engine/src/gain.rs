//! ReplayGain measurement over a decode session
//!
//! The whole file is pulled through a loudness scan in fixed chunks, then
//! integrated loudness, loudness range and true peak are read back and turned
//! into a ReplayGain 2.0 track gain (`-18 LUFS` reference).

use crate::session::{DecodeSession, LoudnessScan};
use soul_core::types::{LoudnessMode, LoudnessModes};
use soul_core::{report_progress, AudioEngine, ProgressCallback, ProgressFn, Result, SoulError};
use soul_loudness::{linear_to_db, lufs_to_gain, TrackLoudness};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Bytes pulled per chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Scan priority passed to the engine
pub const SCAN_PRIORITY: i32 = 0;

/// Everything a completed scan measured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainMeasurement {
    /// Integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// Loudness range in LU
    pub loudness_range_lu: f64,
    /// True peak, linear amplitude
    pub true_peak_linear: f64,
    /// ReplayGain track gain in dB
    pub track_gain_db: f64,
    /// Duration of the measured audio, if the engine knows it
    pub duration_seconds: Option<f64>,
}

impl GainMeasurement {
    /// True peak in dBFS
    pub fn true_peak_db(&self) -> f64 {
        linear_to_db(self.true_peak_linear)
    }

    /// Whether applying the track gain would push the peak above full scale
    pub fn would_clip(&self) -> bool {
        self.track_gain_db + self.true_peak_db() > 0.0
    }

    /// Input for album gain; `None` without a known duration
    pub fn track_loudness(&self) -> Option<TrackLoudness> {
        self.duration_seconds.map(|duration_seconds| TrackLoudness {
            integrated_lufs: self.integrated_lufs,
            true_peak_linear: self.true_peak_linear,
            duration_seconds,
        })
    }
}

/// Outcome of a gain measurement
///
/// When `success` is false the numbers are not meaningful and
/// `error_message` says why.
#[derive(Debug, Clone, PartialEq)]
pub struct GainResult {
    pub track_gain_db: f64,
    pub true_peak_linear: f64,
    pub integrated_lufs: f64,
    pub loudness_range_lu: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl GainResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            track_gain_db: 0.0,
            true_peak_linear: 0.0,
            integrated_lufs: 0.0,
            loudness_range_lu: 0.0,
            success: false,
            error_message: Some(message.into()),
        }
    }
}

impl From<GainMeasurement> for GainResult {
    fn from(m: GainMeasurement) -> Self {
        Self {
            track_gain_db: m.track_gain_db,
            true_peak_linear: m.true_peak_linear,
            integrated_lufs: m.integrated_lufs,
            loudness_range_lu: m.loudness_range_lu,
            success: true,
            error_message: None,
        }
    }
}

/// Measures ReplayGain through the engine's loudness add-on
#[derive(Clone)]
pub struct GainAnalyzer {
    engine: Arc<dyn AudioEngine>,
}

impl GainAnalyzer {
    pub fn new(engine: Arc<dyn AudioEngine>) -> Self {
        Self { engine }
    }

    /// Measure `path`; failures come back as a failed [`GainResult`]
    pub fn measure(
        &self,
        path: &Path,
        on_progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> GainResult {
        match self.try_measure(path, on_progress, cancel) {
            Ok(measurement) => measurement.into(),
            Err(e) => {
                if e.is_cancelled() {
                    tracing::debug!("Gain analysis of {} cancelled", path.display());
                } else {
                    tracing::warn!("Gain analysis of {} failed: {}", path.display(), e);
                }
                GainResult::failed(e.to_string())
            }
        }
    }

    /// Measure `path`, keeping the error
    ///
    /// # Errors
    /// `NotFound` if the file is missing, `Engine` naming the step that failed
    /// (stream create, scan start, a chunk read or one of the three level
    /// reads), `Cancelled` if `cancel` fired after a chunk, `Analysis` for
    /// silent input
    pub fn try_measure(
        &self,
        path: &Path,
        on_progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> Result<GainMeasurement> {
        let session = DecodeSession::open(self.engine.as_ref(), path)?;
        let scan = LoudnessScan::start(
            &session,
            LoudnessModes::INTEGRATED | LoudnessModes::RANGE | LoudnessModes::TRUE_PEAK,
            SCAN_PRIORITY,
        )?;

        let total = session.length_bytes();
        let mut buffer = vec![0_u8; CHUNK_SIZE];
        let mut processed = 0_u64;
        report_progress(on_progress, 0.1);

        loop {
            let n = session.pull_chunk(&mut buffer)?;
            if n == 0 {
                break;
            }
            processed += n as u64;

            if total > 0 {
                let fraction = (processed as f64 / total as f64).min(1.0);
                report_progress(on_progress, 0.1 + 0.8 * fraction);
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(SoulError::Cancelled);
            }
        }

        let integrated_lufs = scan.level(LoudnessMode::Integrated)?;
        if !integrated_lufs.is_finite() {
            return Err(SoulError::analysis("audio is silent"));
        }
        let loudness_range_lu = scan.level(LoudnessMode::Range)?;
        let true_peak_linear = scan.level(LoudnessMode::TruePeak)?;

        let measurement = GainMeasurement {
            integrated_lufs,
            loudness_range_lu,
            true_peak_linear,
            track_gain_db: lufs_to_gain(integrated_lufs),
            duration_seconds: session.duration(),
        };

        tracing::debug!(
            "Loudness of {}: {:.2} LUFS, {:.2} LU, peak {:.4}, gain {:+.2} dB",
            path.display(),
            integrated_lufs,
            loudness_range_lu,
            true_peak_linear,
            measurement.track_gain_db
        );
        report_progress(on_progress, 1.0);
        Ok(measurement)
    }

    /// [`measure`](Self::measure) on the blocking thread pool
    pub async fn measure_async(
        &self,
        path: PathBuf,
        on_progress: Option<ProgressCallback>,
        cancel: Option<CancellationToken>,
    ) -> GainResult {
        let analyzer = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            analyzer.measure(&path, on_progress.as_deref(), cancel.as_ref())
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Gain analysis task failed: {}", e);
                GainResult::failed(format!("analysis task failed: {}", e))
            }
        }
    }
}

impl std::fmt::Debug for GainAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GainAnalyzer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use soul_core::types::{ChannelInfo, ScanHandle, StreamHandle};
    use soul_core::{ErrorCode, MockAudioEngine};

    /// Engine with one stream of `chunks` full chunks and a scan reading the
    /// given levels
    fn scanning_engine(chunks: usize, integrated: f64) -> MockAudioEngine {
        let mut engine = MockAudioEngine::new();
        let mut seq = Sequence::new();

        engine
            .expect_stream_create_file()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(StreamHandle::from_raw(7).unwrap()));
        engine.expect_channel_info().returning(|_| {
            Ok(ChannelInfo {
                frequency: 48000,
                channels: 2,
                source_bits: Some(24),
            })
        });
        engine
            .expect_channel_length()
            .returning(move |_| Ok((chunks * CHUNK_SIZE) as u64));
        engine
            .expect_channel_bytes_to_seconds()
            .returning(|_, bytes| Ok(bytes as f64 / 384_000.0));
        engine
            .expect_loudness_start()
            .with(
                eq(StreamHandle::from_raw(7).unwrap()),
                eq(LoudnessModes::INTEGRATED | LoudnessModes::RANGE | LoudnessModes::TRUE_PEAK),
                eq(SCAN_PRIORITY),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ScanHandle::from_raw(9).unwrap()));

        let mut remaining = chunks;
        engine.expect_channel_data().returning(move |_, buffer| {
            if remaining == 0 {
                return Ok(0);
            }
            remaining -= 1;
            Ok(buffer.len())
        });

        engine
            .expect_loudness_level()
            .returning(move |_, mode| match mode {
                LoudnessMode::Integrated => Ok(integrated),
                LoudnessMode::Range => Ok(4.5),
                LoudnessMode::TruePeak => Ok(0.9),
            });

        // Scan first, then the stream
        engine
            .expect_loudness_stop()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        engine
            .expect_stream_free()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        engine
    }

    #[test]
    fn gain_from_integrated_loudness() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = GainAnalyzer::new(Arc::new(scanning_engine(3, -14.0)));

        let result = analyzer.measure(file.path(), None, None);
        assert!(result.success);
        assert_eq!(result.track_gain_db, -4.0);
        assert_eq!(result.integrated_lufs, -14.0);
        assert_eq!(result.loudness_range_lu, 4.5);
        assert_eq!(result.true_peak_linear, 0.9);
        assert_eq!(result.error_message, None);
    }

    #[test]
    fn progress_tracks_chunks() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = GainAnalyzer::new(Arc::new(scanning_engine(4, -20.0)));

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressCallback = Arc::new(move |v| sink_seen.lock().unwrap().push(v));

        let measurement = analyzer
            .try_measure(file.path(), Some(sink.as_ref()), None)
            .unwrap();
        assert!(measurement.duration_seconds.is_some());

        let expected = [0.1, 0.3, 0.5, 0.7, 0.9, 1.0];
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), expected.len());
        for (got, want) in seen.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
    }

    #[test]
    fn silence_is_a_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = GainAnalyzer::new(Arc::new(scanning_engine(1, f64::NEG_INFINITY)));

        let result = analyzer.measure(file.path(), None, None);
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("silent"));
    }

    #[test]
    fn cancellation_still_releases_handles() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = GainAnalyzer::new(Arc::new(scanning_engine(5, -20.0)));

        let token = CancellationToken::new();
        token.cancel();

        let result = analyzer.measure(file.path(), None, Some(&token));
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Analysis cancelled"));
    }

    #[test]
    fn scan_start_failure_frees_the_stream() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Ok(StreamHandle::from_raw(2).unwrap()));
        engine.expect_channel_info().returning(|_| {
            Ok(ChannelInfo {
                frequency: 44100,
                channels: 1,
                source_bits: None,
            })
        });
        engine
            .expect_channel_length()
            .returning(|_| Err(ErrorCode::NotAvail));
        engine
            .expect_loudness_start()
            .returning(|_, _, _| Err(ErrorCode::Init));
        engine.expect_loudness_stop().times(0);
        engine.expect_stream_free().times(1).returning(|_| Ok(()));

        let analyzer = GainAnalyzer::new(Arc::new(engine));
        let err = analyzer.try_measure(file.path(), None, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Init));
    }

    #[test]
    fn failed_read_names_the_step() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Ok(StreamHandle::from_raw(2).unwrap()));
        engine.expect_channel_info().returning(|_| {
            Ok(ChannelInfo {
                frequency: 44100,
                channels: 1,
                source_bits: None,
            })
        });
        engine.expect_channel_length().returning(|_| Ok(0));
        engine
            .expect_channel_bytes_to_seconds()
            .returning(|_, _| Ok(0.0));
        engine
            .expect_loudness_start()
            .returning(|_, _, _| Ok(ScanHandle::from_raw(4).unwrap()));
        engine.expect_channel_data().returning(|_, _| Ok(0));
        engine
            .expect_loudness_level()
            .returning(|_, mode| match mode {
                LoudnessMode::Integrated => Ok(-23.0),
                _ => Err(ErrorCode::NotAvail),
            });
        engine.expect_loudness_stop().times(1).returning(|_| Ok(()));
        engine.expect_stream_free().times(1).returning(|_| Ok(()));

        let analyzer = GainAnalyzer::new(Arc::new(engine));
        let result = analyzer.measure(file.path(), None, None);
        assert!(!result.success);
        assert!(result
            .error_message
            .unwrap()
            .contains("loudness range read"));
    }

    #[test]
    fn measurement_helpers() {
        let m = GainMeasurement {
            integrated_lufs: -10.0,
            loudness_range_lu: 3.0,
            true_peak_linear: 0.5,
            track_gain_db: -8.0,
            duration_seconds: Some(200.0),
        };
        assert!((m.true_peak_db() - -6.0206).abs() < 1e-3);
        assert!(!m.would_clip());

        let loud = GainMeasurement {
            track_gain_db: 8.0,
            ..m
        };
        assert!(loud.would_clip());

        let track = m.track_loudness().unwrap();
        assert_eq!(track.duration_seconds, 200.0);
        assert!(GainMeasurement {
            duration_seconds: None,
            ..m
        }
        .track_loudness()
        .is_none());
    }
}
