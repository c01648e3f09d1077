//! Scoped engine handles
//!
//! [`DecodeSession`] owns one decode stream and [`LoudnessScan`] one scan
//! attached to it. Both release their handle in `Drop`, so every exit path of
//! an analysis (early return, `?`, cancellation) frees them exactly once. A
//! scan borrows its session and is therefore always released first.

use soul_core::types::{ChannelInfo, LoudnessMode, LoudnessModes, ScanHandle, StreamFlags, StreamHandle};
use soul_core::{AudioEngine, ErrorCode, Result, SoulError};
use std::path::{Path, PathBuf};

/// Flags for analysis streams: decode only, float samples, exact length
pub const SESSION_FLAGS: StreamFlags = StreamFlags::from_bits(
    StreamFlags::DECODE.bits() | StreamFlags::FLOAT.bits() | StreamFlags::PRESCAN.bits(),
);

/// A decode-only stream over one file
pub struct DecodeSession<'e> {
    engine: &'e dyn AudioEngine,
    handle: StreamHandle,
    path: PathBuf,
    info: ChannelInfo,
    length_bytes: Option<u64>,
    duration: Option<f64>,
}

impl<'e> DecodeSession<'e> {
    /// Open `path` as a decode stream
    ///
    /// # Errors
    /// `NotFound` if the file does not exist; an engine error carrying the
    /// engine's code if the stream cannot be created
    pub fn open(engine: &'e dyn AudioEngine, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SoulError::not_found("Audio file", path.display().to_string()));
        }

        let handle = engine
            .stream_create_file(path, SESSION_FLAGS)
            .map_err(|code| SoulError::engine("stream create", code))?;

        let info = match engine.channel_info(handle) {
            Ok(info) => info,
            Err(code) => {
                release_stream(engine, handle);
                return Err(SoulError::engine("channel info", code));
            }
        };

        let length_bytes = match engine.channel_length(handle) {
            Ok(bytes) => Some(bytes),
            Err(code) => {
                tracing::debug!("Length of {} unknown: {}", path.display(), code);
                None
            }
        };
        let duration =
            length_bytes.and_then(|bytes| engine.channel_bytes_to_seconds(handle, bytes).ok());

        tracing::debug!(
            "Opened {}: {} Hz, {} channel(s), {:.2}s",
            path.display(),
            info.frequency,
            info.channels,
            duration.unwrap_or(0.0)
        );

        Ok(Self {
            engine,
            handle,
            path: path.to_path_buf(),
            info,
            length_bytes,
            duration,
        })
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frequency and channel count of the decoded samples
    pub fn info(&self) -> ChannelInfo {
        self.info
    }

    /// Length of the decoded sample data in bytes (0 if unknown)
    pub fn length_bytes(&self) -> u64 {
        self.length_bytes.unwrap_or(0)
    }

    /// Duration in seconds, if the engine knows the length
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Decode the next block into `buffer`
    ///
    /// Returns the number of bytes written; `0` at end of stream.
    pub fn pull_chunk(&self, buffer: &mut [u8]) -> Result<usize> {
        match self.engine.channel_data(self.handle, buffer) {
            Ok(n) => Ok(n),
            Err(ErrorCode::Ended) => Ok(0),
            Err(code) => Err(SoulError::engine("channel data", code)),
        }
    }
}

impl Drop for DecodeSession<'_> {
    fn drop(&mut self) {
        release_stream(self.engine, self.handle);
    }
}

impl std::fmt::Debug for DecodeSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("handle", &self.handle)
            .field("path", &self.path)
            .field("info", &self.info)
            .field("length_bytes", &self.length_bytes)
            .finish_non_exhaustive()
    }
}

fn release_stream(engine: &dyn AudioEngine, handle: StreamHandle) {
    if let Err(code) = engine.stream_free(handle) {
        tracing::warn!("Failed to free stream {}: {}", handle, code);
    }
}

/// A loudness scan measuring everything pulled through its session
pub struct LoudnessScan<'s, 'e> {
    session: &'s DecodeSession<'e>,
    handle: ScanHandle,
}

impl<'s, 'e> LoudnessScan<'s, 'e> {
    /// Attach a scan measuring `modes` to `session`
    pub fn start(session: &'s DecodeSession<'e>, modes: LoudnessModes, priority: i32) -> Result<Self> {
        let handle = session
            .engine
            .loudness_start(session.handle, modes, priority)
            .map_err(|code| SoulError::engine("loudness start", code))?;
        Ok(Self { session, handle })
    }

    pub fn handle(&self) -> ScanHandle {
        self.handle
    }

    /// Read one measurement
    ///
    /// Only meaningful once the whole stream has been pulled.
    pub fn level(&self, mode: LoudnessMode) -> Result<f64> {
        self.session
            .engine
            .loudness_level(self.handle, mode)
            .map_err(|code| {
                let operation = match mode {
                    LoudnessMode::Integrated => "integrated loudness read",
                    LoudnessMode::Range => "loudness range read",
                    LoudnessMode::TruePeak => "true peak read",
                };
                SoulError::engine(operation, code)
            })
    }
}

impl Drop for LoudnessScan<'_, '_> {
    fn drop(&mut self) {
        if let Err(code) = self.session.engine.loudness_stop(self.handle) {
            tracing::warn!("Failed to stop loudness scan {}: {}", self.handle, code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use soul_core::MockAudioEngine;

    fn stream(raw: u32) -> StreamHandle {
        StreamHandle::from_raw(raw).unwrap()
    }

    fn info() -> ChannelInfo {
        ChannelInfo {
            frequency: 44100,
            channels: 2,
            source_bits: Some(16),
        }
    }

    #[test]
    fn missing_file_never_reaches_the_engine() {
        let engine = MockAudioEngine::new();
        let result = DecodeSession::open(&engine, Path::new("/nonexistent/song.wav"));
        assert!(matches!(result, Err(SoulError::NotFound { .. })));
    }

    #[test]
    fn stream_create_failure_carries_the_code() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Err(ErrorCode::FileForm));
        engine.expect_stream_free().times(0);

        let err = DecodeSession::open(&engine, file.path()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::FileForm));
    }

    #[test]
    fn stream_freed_once_on_drop() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .withf(|_, flags| *flags == SESSION_FLAGS)
            .returning(|_, _| Ok(stream(3)));
        engine.expect_channel_info().returning(|_| Ok(info()));
        engine
            .expect_channel_length()
            .returning(|_| Err(ErrorCode::NotAvail));
        engine
            .expect_stream_free()
            .with(eq(stream(3)))
            .times(1)
            .returning(|_| Ok(()));

        let session = DecodeSession::open(&engine, file.path()).unwrap();
        assert_eq!(session.length_bytes(), 0);
        assert_eq!(session.duration(), None);
        assert_eq!(session.info().channels, 2);
        drop(session);
    }

    #[test]
    fn channel_info_failure_frees_the_stream() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Ok(stream(5)));
        engine
            .expect_channel_info()
            .returning(|_| Err(ErrorCode::Handle));
        engine.expect_stream_free().times(1).returning(|_| Ok(()));

        let err = DecodeSession::open(&engine, file.path()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Handle));
    }

    #[test]
    fn ended_reads_as_end_of_stream() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = MockAudioEngine::new();
        engine
            .expect_stream_create_file()
            .returning(|_, _| Ok(stream(1)));
        engine.expect_channel_info().returning(|_| Ok(info()));
        engine.expect_channel_length().returning(|_| Ok(352_800));
        engine
            .expect_channel_bytes_to_seconds()
            .returning(|_, bytes| Ok(bytes as f64 / 352_800.0));
        engine
            .expect_channel_data()
            .returning(|_, _| Err(ErrorCode::Ended));
        engine.expect_stream_free().returning(|_| Ok(()));

        let session = DecodeSession::open(&engine, file.path()).unwrap();
        assert_eq!(session.duration(), Some(1.0));
        assert_eq!(session.pull_chunk(&mut [0_u8; 64]).unwrap(), 0);
    }
}
