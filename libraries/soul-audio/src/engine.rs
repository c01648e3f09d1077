//! Reference audio engine built on Symphonia and ebur128
use crate::decoder::{decode_mono_range, DecodeStream};
use crate::plugins::PluginRegistry;
use crate::tempo;
use soul_core::types::{
    BpmRange, ChannelInfo, ConfigOption, Device, DeviceInfo, ExclusiveFlags, InitFlags,
    LoudnessMode, LoudnessModes, PluginHandle, PluginInfo, ScanHandle, StreamFlags, StreamHandle,
    TempoFlags,
};
use soul_core::{AudioEngine, EngineResult, ErrorCode};
use soul_loudness::{LoudnessAnalyzer, LoudnessError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Name reported for the engine's only device
pub const DEVICE_NAME: &str = "Decode only";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct EngineState {
    initialized: bool,
    config: HashMap<ConfigOption, u32>,
    search_path: Option<PathBuf>,
    plugins: PluginRegistry,
}

struct StreamEntry {
    stream: DecodeStream,
    /// Loudness scans fed by this stream, keyed by raw scan handle
    scans: HashMap<u32, LoudnessAnalyzer>,
    scratch: Vec<f32>,
}

/// Decode-only [`AudioEngine`] implementation
///
/// Streams decode through Symphonia into interleaved `f32`, loudness scans
/// use ebur128, and tempo comes from [`tempo::estimate_bpm`]. Nothing is ever
/// routed to an output device, so exclusive output is not available.
///
/// Each stream sits behind its own mutex; calls on different streams run
/// concurrently.
pub struct SymphoniaEngine {
    state: Mutex<EngineState>,
    streams: Mutex<HashMap<u32, Arc<Mutex<StreamEntry>>>>,
    /// Raw scan handle to the raw handle of the stream it is attached to
    scan_owners: Mutex<HashMap<u32, u32>>,
    next_handle: AtomicU32,
}

impl SymphoniaEngine {
    /// Create an uninitialized engine
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            streams: Mutex::new(HashMap::new()),
            scan_owners: Mutex::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    /// Number of open streams
    pub fn open_streams(&self) -> usize {
        lock(&self.streams).len()
    }

    /// Number of loudness scans not yet stopped
    pub fn active_scans(&self) -> usize {
        lock(&self.scan_owners).len()
    }

    /// Value last set for a configuration option
    pub fn config_value(&self, option: ConfigOption) -> Option<u32> {
        lock(&self.state).config.get(&option).copied()
    }

    /// Current library search path
    pub fn search_path(&self) -> Option<PathBuf> {
        lock(&self.state).search_path.clone()
    }

    fn ensure_init(&self) -> EngineResult<()> {
        if lock(&self.state).initialized {
            Ok(())
        } else {
            Err(ErrorCode::Init)
        }
    }

    fn allocate_handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn entry(&self, stream: StreamHandle) -> EngineResult<Arc<Mutex<StreamEntry>>> {
        self.ensure_init()?;
        lock(&self.streams)
            .get(&stream.raw())
            .cloned()
            .ok_or(ErrorCode::Handle)
    }

    fn scan_entry(&self, scan: ScanHandle) -> EngineResult<Arc<Mutex<StreamEntry>>> {
        self.ensure_init()?;
        let owner = lock(&self.scan_owners)
            .get(&scan.raw())
            .copied()
            .ok_or(ErrorCode::Handle)?;
        lock(&self.streams)
            .get(&owner)
            .cloned()
            .ok_or(ErrorCode::Handle)
    }
}

impl Default for SymphoniaEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(option: ConfigOption, value: u32) -> EngineResult<()> {
    let valid = match option {
        ConfigOption::PlaybackBuffer => (10..=5000).contains(&value),
        ConfigOption::UpdatePeriod => value == 0 || (5..=100).contains(&value),
        ConfigOption::UpdateThreads => value <= 8,
    };
    if valid {
        Ok(())
    } else {
        Err(ErrorCode::IllParam)
    }
}

fn loudness_code(err: &LoudnessError) -> ErrorCode {
    match err {
        LoudnessError::InvalidSampleRate(_) | LoudnessError::InvalidChannelCount(_) => {
            ErrorCode::Format
        }
        LoudnessError::ModeNotEnabled(_) => ErrorCode::IllParam,
        LoudnessError::NoSamples => ErrorCode::NotAvail,
        LoudnessError::AnalysisError(_) => ErrorCode::Unknown,
    }
}

impl AudioEngine for SymphoniaEngine {
    fn init(&self, device: Device, sample_rate: u32, flags: InitFlags) -> EngineResult<()> {
        let mut state = lock(&self.state);
        if state.initialized {
            return Err(ErrorCode::Already);
        }
        if let Device::Index(index) = device {
            if index > 1 {
                return Err(ErrorCode::Device);
            }
        }
        if sample_rate == 0 {
            return Err(ErrorCode::IllParam);
        }

        tracing::debug!(
            "Engine init: device {}, {} Hz, flags {:#x}",
            device,
            sample_rate,
            flags.bits()
        );
        state.initialized = true;
        Ok(())
    }

    fn free(&self) -> EngineResult<()> {
        let mut state = lock(&self.state);
        if !state.initialized {
            return Err(ErrorCode::Init);
        }

        lock(&self.scan_owners).clear();
        let streams = std::mem::take(&mut *lock(&self.streams));
        if !streams.is_empty() {
            tracing::debug!("Engine free released {} open stream(s)", streams.len());
        }

        state.plugins.clear();
        state.config.clear();
        state.initialized = false;
        Ok(())
    }

    fn exclusive_init(
        &self,
        _sample_rate: u32,
        _channels: u16,
        _flags: ExclusiveFlags,
    ) -> EngineResult<()> {
        self.ensure_init()?;
        Err(ErrorCode::NotAvail)
    }

    fn exclusive_free(&self) -> EngineResult<()> {
        self.ensure_init()?;
        Err(ErrorCode::NotAvail)
    }

    fn set_config(&self, option: ConfigOption, value: u32) -> EngineResult<()> {
        validate_config(option, value)?;
        lock(&self.state).config.insert(option, value);
        Ok(())
    }

    fn set_search_path(&self, path: &Path) -> EngineResult<()> {
        lock(&self.state).search_path = Some(path.to_path_buf());
        Ok(())
    }

    fn clear_search_path(&self) -> EngineResult<()> {
        lock(&self.state).search_path = None;
        Ok(())
    }

    fn device_info(&self) -> EngineResult<DeviceInfo> {
        self.ensure_init()?;
        Ok(DeviceInfo {
            name: DEVICE_NAME.to_string(),
            driver: None,
            is_default: true,
            is_enabled: true,
            is_initialized: true,
        })
    }

    fn plugin_load(&self, path: &Path) -> EngineResult<PluginHandle> {
        let mut state = lock(&self.state);
        if !state.initialized {
            return Err(ErrorCode::Init);
        }

        let resolved = match &state.search_path {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        let handle = state.plugins.load(&resolved)?;
        tracing::debug!("Loaded plugin {} as {}", resolved.display(), handle);
        Ok(handle)
    }

    fn plugin_info(&self, plugin: PluginHandle) -> EngineResult<PluginInfo> {
        let state = lock(&self.state);
        if !state.initialized {
            return Err(ErrorCode::Init);
        }
        state.plugins.info(plugin)
    }

    fn stream_create_file(&self, path: &Path, flags: StreamFlags) -> EngineResult<StreamHandle> {
        {
            let state = lock(&self.state);
            if !state.initialized {
                return Err(ErrorCode::Init);
            }
            // No output device: only decode streams exist
            if !flags.contains(StreamFlags::DECODE) {
                return Err(ErrorCode::NotAvail);
            }
            if !flags.contains(StreamFlags::FLOAT) {
                return Err(ErrorCode::Format);
            }
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if !state.plugins.supports_extension(ext) {
                    return Err(ErrorCode::FileForm);
                }
            }
        }

        let stream = DecodeStream::open(path).map_err(|e| {
            tracing::debug!("Cannot open {}: {}", path.display(), e);
            e.code()
        })?;

        let raw = self.allocate_handle();
        let handle = StreamHandle::from_raw(raw).ok_or(ErrorCode::Mem)?;
        lock(&self.streams).insert(
            raw,
            Arc::new(Mutex::new(StreamEntry {
                stream,
                scans: HashMap::new(),
                scratch: Vec::new(),
            })),
        );

        tracing::debug!("Opened stream {} for {}", handle, path.display());
        Ok(handle)
    }

    fn stream_free(&self, stream: StreamHandle) -> EngineResult<()> {
        self.ensure_init()?;
        let entry = lock(&self.streams)
            .remove(&stream.raw())
            .ok_or(ErrorCode::Handle)?;

        // Scans die with their stream
        let orphaned: Vec<u32> = lock(&entry).scans.keys().copied().collect();
        let mut owners = lock(&self.scan_owners);
        for scan in orphaned {
            owners.remove(&scan);
        }
        Ok(())
    }

    fn channel_info(&self, stream: StreamHandle) -> EngineResult<ChannelInfo> {
        let entry = self.entry(stream)?;
        let info = lock(&entry).stream.info();
        Ok(info)
    }

    fn channel_length(&self, stream: StreamHandle) -> EngineResult<u64> {
        let entry = self.entry(stream)?;
        let entry = lock(&entry);
        let info = entry.stream.info();
        entry
            .stream
            .n_frames()
            .map(|frames| frames * u64::from(info.channels) * 4)
            .ok_or(ErrorCode::NotAvail)
    }

    fn channel_bytes_to_seconds(&self, stream: StreamHandle, bytes: u64) -> EngineResult<f64> {
        let info = self.channel_info(stream)?;
        let rate = info.float_byte_rate();
        if rate == 0 {
            return Err(ErrorCode::Format);
        }
        Ok(bytes as f64 / rate as f64)
    }

    fn channel_data(&self, stream: StreamHandle, buffer: &mut [u8]) -> EngineResult<usize> {
        let entry = self.entry(stream)?;
        let mut guard = lock(&entry);
        let StreamEntry {
            stream: decoder,
            scans,
            scratch,
        } = &mut *guard;

        let frame_bytes = decoder.info().channels as usize * 4;
        if frame_bytes == 0 || buffer.len() < frame_bytes {
            return Err(ErrorCode::IllParam);
        }

        scratch.resize(buffer.len() / 4, 0.0);
        let samples = decoder.read(scratch).map_err(|e| e.code())?;
        if samples == 0 {
            return Ok(0);
        }

        let decoded = &scratch[..samples];
        for (bytes, sample) in buffer.chunks_exact_mut(4).zip(decoded) {
            bytes.copy_from_slice(&sample.to_le_bytes());
        }

        for analyzer in scans.values_mut() {
            analyzer
                .add_frames(decoded)
                .map_err(|e| loudness_code(&e))?;
        }

        Ok(samples * 4)
    }

    fn tempo_detect(
        &self,
        stream: StreamHandle,
        start: f64,
        end: f64,
        range: u32,
        flags: TempoFlags,
    ) -> EngineResult<f32> {
        // Decode from a separate reader so the stream position is untouched
        let entry = self.entry(stream)?;
        let path = lock(&entry).stream.path().to_path_buf();

        let range = BpmRange::unpack(range);
        if !range.is_valid() || !(start >= 0.0 && end > start) {
            return Err(ErrorCode::IllParam);
        }

        tracing::debug!(
            "Tempo scan of {} over [{:.1}, {:.1}]s, {}{}",
            path.display(),
            start,
            end,
            range,
            if flags.contains(TempoFlags::BACKGROUND) {
                " (background)"
            } else {
                ""
            }
        );

        let (mono, sample_rate) = decode_mono_range(&path, start, end).map_err(|e| e.code())?;
        Ok(tempo::estimate_bpm(&mono, sample_rate, range))
    }

    fn loudness_start(
        &self,
        stream: StreamHandle,
        modes: LoudnessModes,
        priority: i32,
    ) -> EngineResult<ScanHandle> {
        if modes.is_empty() {
            return Err(ErrorCode::IllParam);
        }
        let entry = self.entry(stream)?;
        let mut entry = lock(&entry);

        let info = entry.stream.info();
        let analyzer =
            LoudnessAnalyzer::with_modes(info.frequency, u32::from(info.channels), modes)
                .map_err(|e| loudness_code(&e))?;

        let raw = self.allocate_handle();
        let handle = ScanHandle::from_raw(raw).ok_or(ErrorCode::Mem)?;
        entry.scans.insert(raw, analyzer);
        lock(&self.scan_owners).insert(raw, stream.raw());

        tracing::debug!(
            "Loudness scan {} on stream {} (modes {:#x}, priority {})",
            handle,
            stream,
            modes.bits(),
            priority
        );
        Ok(handle)
    }

    fn loudness_level(&self, scan: ScanHandle, mode: LoudnessMode) -> EngineResult<f64> {
        let entry = self.scan_entry(scan)?;
        let entry = lock(&entry);
        let analyzer = entry.scans.get(&scan.raw()).ok_or(ErrorCode::Handle)?;

        if !analyzer.modes().contains(mode.required_mode()) {
            return Err(ErrorCode::IllParam);
        }

        let level = match mode {
            LoudnessMode::Integrated => analyzer.integrated_lufs(),
            LoudnessMode::Range => analyzer.loudness_range_lu(),
            LoudnessMode::TruePeak => analyzer.true_peak_linear(),
        };
        level.map_err(|e| loudness_code(&e))
    }

    fn loudness_stop(&self, scan: ScanHandle) -> EngineResult<()> {
        self.ensure_init()?;
        let owner = lock(&self.scan_owners)
            .remove(&scan.raw())
            .ok_or(ErrorCode::Handle)?;

        let entry = lock(&self.streams).get(&owner).cloned();
        if let Some(entry) = entry {
            lock(&entry).scans.remove(&scan.raw());
        }
        Ok(())
    }
}
