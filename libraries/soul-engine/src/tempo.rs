//! Tempo (BPM) detection over a decode session
use crate::session::DecodeSession;
use soul_core::types::{BpmRange, TempoFlags};
use soul_core::{report_progress, AudioEngine, ProgressCallback, ProgressFn, Result, SoulError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tuning for [`TempoAnalyzer`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoOptions {
    /// Longest stretch analyzed from the start of the file, in seconds
    pub window: f64,
    /// BPM search range
    pub range: BpmRange,
    /// Pause between progress steps
    pub step_delay: Duration,
}

impl Default for TempoOptions {
    fn default() -> Self {
        Self {
            window: 20.0,
            range: BpmRange::DEFAULT,
            step_delay: Duration::from_millis(100),
        }
    }
}

/// Outcome of a tempo detection
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TempoResult {
    /// Tempo rounded to a whole BPM; `None` if no stable tempo was found, the
    /// analysis failed or it was cancelled
    pub bpm: Option<f64>,
}

/// Detects the tempo of audio files through the engine's tempo add-on
#[derive(Clone)]
pub struct TempoAnalyzer {
    engine: Arc<dyn AudioEngine>,
    options: TempoOptions,
}

impl TempoAnalyzer {
    pub fn new(engine: Arc<dyn AudioEngine>) -> Self {
        Self::with_options(engine, TempoOptions::default())
    }

    pub fn with_options(engine: Arc<dyn AudioEngine>, options: TempoOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &TempoOptions {
        &self.options
    }

    /// Detect the tempo of `path`
    ///
    /// Failures are logged and reported as an absent BPM.
    pub fn detect(
        &self,
        path: &Path,
        on_progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> TempoResult {
        match self.try_detect(path, on_progress, cancel) {
            Ok(bpm) => TempoResult { bpm: Some(bpm) },
            Err(SoulError::Cancelled) => {
                tracing::debug!("Tempo detection of {} cancelled", path.display());
                TempoResult::default()
            }
            Err(SoulError::Analysis(reason)) => {
                tracing::info!("No tempo for {}: {}", path.display(), reason);
                TempoResult::default()
            }
            Err(e) => {
                tracing::warn!("Tempo detection of {} failed: {}", path.display(), e);
                TempoResult::default()
            }
        }
    }

    /// Detect the tempo of `path`, keeping the reason for a missing value
    ///
    /// # Errors
    /// `Cancelled` if `cancel` fired at a checkpoint, `Analysis` if the
    /// engine found no stable tempo, or the error that stopped the analysis
    pub fn try_detect(
        &self,
        path: &Path,
        on_progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> Result<f64> {
        let session = DecodeSession::open(self.engine.as_ref(), path)?;
        report_progress(on_progress, 0.1);

        let window = session
            .duration()
            .map_or(self.options.window, |duration| duration.min(self.options.window));

        let raw = self
            .engine
            .tempo_detect(
                session.handle(),
                0.0,
                window,
                self.options.range.pack(),
                TempoFlags::BACKGROUND,
            )
            .map_err(|code| SoulError::engine("tempo detect", code))?;

        for step in 3..=9 {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(SoulError::Cancelled);
            }
            report_progress(on_progress, f64::from(step) / 10.0);
            std::thread::sleep(self.options.step_delay);
        }
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(SoulError::Cancelled);
        }

        if raw <= 0.0 {
            return Err(SoulError::analysis("no stable tempo found"));
        }

        let bpm = f64::from(raw).round();
        tracing::debug!("Tempo of {}: {} BPM (raw {:.2})", path.display(), bpm, raw);
        report_progress(on_progress, 1.0);
        Ok(bpm)
    }

    /// [`detect`](Self::detect) on the blocking thread pool
    pub async fn detect_async(
        &self,
        path: PathBuf,
        on_progress: Option<ProgressCallback>,
        cancel: Option<CancellationToken>,
    ) -> TempoResult {
        let analyzer = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            analyzer.detect(&path, on_progress.as_deref(), cancel.as_ref())
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Tempo detection task failed: {}", e);
                TempoResult::default()
            }
        }
    }
}

impl std::fmt::Debug for TempoAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempoAnalyzer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, eq};
    use soul_core::types::{ChannelInfo, StreamHandle};
    use soul_core::{ErrorCode, MockAudioEngine};
    use std::sync::Mutex;

    fn quick() -> TempoOptions {
        TempoOptions {
            step_delay: Duration::ZERO,
            ..TempoOptions::default()
        }
    }

    /// Engine with one 90 s stereo stream answering `bpm`
    fn engine_with_tempo(bpm: f32) -> MockAudioEngine {
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Ok(StreamHandle::from_raw(1).unwrap()));
        engine.expect_channel_info().returning(|_| {
            Ok(ChannelInfo {
                frequency: 44100,
                channels: 2,
                source_bits: None,
            })
        });
        engine
            .expect_channel_length()
            .returning(|_| Ok(90 * 352_800));
        engine
            .expect_channel_bytes_to_seconds()
            .returning(|_, bytes| Ok(bytes as f64 / 352_800.0));
        engine
            .expect_tempo_detect()
            .with(
                always(),
                eq(0.0),
                eq(20.0),
                eq((200 << 16) | 60),
                eq(TempoFlags::BACKGROUND),
            )
            .times(1)
            .returning(move |_, _, _, _, _| Ok(bpm));
        engine.expect_stream_free().times(1).returning(|_| Ok(()));
        engine
    }

    #[test]
    fn rounds_to_whole_bpm() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = TempoAnalyzer::with_options(Arc::new(engine_with_tempo(127.6)), quick());

        let result = analyzer.detect(file.path(), None, None);
        assert_eq!(result.bpm, Some(128.0));
    }

    #[test]
    fn non_positive_is_absent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = TempoAnalyzer::with_options(Arc::new(engine_with_tempo(0.0)), quick());

        let err = analyzer.try_detect(file.path(), None, None).unwrap_err();
        assert!(matches!(err, SoulError::Analysis(_)));

        let analyzer = TempoAnalyzer::with_options(Arc::new(engine_with_tempo(-1.0)), quick());
        assert_eq!(analyzer.detect(file.path(), None, None).bpm, None);
    }

    #[test]
    fn progress_steps() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = TempoAnalyzer::with_options(Arc::new(engine_with_tempo(120.0)), quick());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressCallback = Arc::new(move |v| sink_seen.lock().unwrap().push(v));

        analyzer.detect(file.path(), Some(sink.as_ref()), None);

        let seen = seen.lock().unwrap();
        let expected = [0.1, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        assert_eq!(seen.len(), expected.len());
        for (got, want) in seen.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn cancelled_result_is_ignored() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let analyzer = TempoAnalyzer::with_options(Arc::new(engine_with_tempo(120.0)), quick());

        let token = CancellationToken::new();
        let sink_token = token.clone();
        let sink: ProgressCallback = Arc::new(move |v| {
            if v >= 0.5 {
                sink_token.cancel();
            }
        });

        let err = analyzer
            .try_detect(file.path(), Some(sink.as_ref()), Some(&token))
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn open_failure_is_absent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Err(ErrorCode::FileForm));
        engine.expect_tempo_detect().times(0);

        let analyzer = TempoAnalyzer::with_options(Arc::new(engine), quick());
        let err = analyzer.try_detect(file.path(), None, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::FileForm));
        assert_eq!(analyzer.detect(file.path(), None, None), TempoResult::default());
    }
}
