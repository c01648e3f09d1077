/// Core traits for Soul analysis
use crate::error::ErrorCode;
use crate::types::{
    ChannelInfo, ConfigOption, Device, DeviceInfo, ExclusiveFlags, InitFlags, LoudnessMode,
    LoudnessModes, PluginHandle, PluginInfo, ScanHandle, StreamFlags, StreamHandle, TempoFlags,
};
use std::path::Path;

/// Result of a single engine call
pub type EngineResult<T> = std::result::Result<T, ErrorCode>;

/// Audio engine contract
///
/// Mirrors a handle-based native audio API: one process-wide engine that is
/// initialized once, opens decode-only streams on demand, loads format plugins
/// from shared libraries, and offers tempo and loudness add-ons that operate
/// on decode streams.
///
/// Every call returns the engine's error code together with the failure, so
/// callers never depend on a separate "last error" read. Implementations must
/// be usable from several threads at once; calls on different stream handles
/// may run concurrently.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait AudioEngine: Send + Sync {
    // === Lifecycle ===

    /// Initialize the output device and the engine
    ///
    /// # Errors
    /// `Already` if initialized, `Device`/`Driver` if the device is unusable
    fn init(&self, device: Device, sample_rate: u32, flags: InitFlags) -> EngineResult<()>;

    /// Free every resource held by the engine (streams, scans, plugins)
    fn free(&self) -> EngineResult<()>;

    /// Initialize the exclusive-mode output subsystem
    ///
    /// # Errors
    /// `NotAvail` if the engine has no exclusive output
    fn exclusive_init(
        &self,
        sample_rate: u32,
        channels: u16,
        flags: ExclusiveFlags,
    ) -> EngineResult<()>;

    /// Free the exclusive-mode output subsystem
    fn exclusive_free(&self) -> EngineResult<()>;

    /// Set an engine-wide configuration option
    fn set_config(&self, option: ConfigOption, value: u32) -> EngineResult<()>;

    /// Directory used to resolve bare library names
    fn set_search_path(&self, path: &Path) -> EngineResult<()>;

    /// Reset the library search path to empty
    fn clear_search_path(&self) -> EngineResult<()>;

    /// Information about the device the engine is currently using
    fn device_info(&self) -> EngineResult<DeviceInfo>;

    // === Plugins ===

    /// Load a format plugin from a shared library
    fn plugin_load(&self, path: &Path) -> EngineResult<PluginHandle>;

    /// Formats added by a loaded plugin
    fn plugin_info(&self, plugin: PluginHandle) -> EngineResult<PluginInfo>;

    // === Streams ===

    /// Open a stream over a file
    fn stream_create_file(&self, path: &Path, flags: StreamFlags) -> EngineResult<StreamHandle>;

    /// Release a stream and everything attached to it
    fn stream_free(&self, stream: StreamHandle) -> EngineResult<()>;

    /// Sample format of an open stream
    fn channel_info(&self, stream: StreamHandle) -> EngineResult<ChannelInfo>;

    /// Total length of the decoded sample data in bytes
    fn channel_length(&self, stream: StreamHandle) -> EngineResult<u64>;

    /// Convert a byte position of the sample stream into seconds
    fn channel_bytes_to_seconds(&self, stream: StreamHandle, bytes: u64) -> EngineResult<f64>;

    /// Decode the next block of samples into `buffer`
    ///
    /// Returns the number of bytes written; `0` signals end of stream.
    fn channel_data(&self, stream: StreamHandle, buffer: &mut [u8]) -> EngineResult<usize>;

    // === Tempo add-on ===

    /// Estimate the tempo of `[start, end]` seconds of a decode stream
    ///
    /// `range` is a packed [`crate::BpmRange`]. A return value `<= 0` means no
    /// stable tempo was found.
    fn tempo_detect(
        &self,
        stream: StreamHandle,
        start: f64,
        end: f64,
        range: u32,
        flags: TempoFlags,
    ) -> EngineResult<f32>;

    // === Loudness add-on ===

    /// Attach a loudness scan to a decode stream
    ///
    /// Samples pulled through [`AudioEngine::channel_data`] are measured as a
    /// side effect.
    fn loudness_start(
        &self,
        stream: StreamHandle,
        modes: LoudnessModes,
        priority: i32,
    ) -> EngineResult<ScanHandle>;

    /// Read one measurement from a scan
    fn loudness_level(&self, scan: ScanHandle, mode: LoudnessMode) -> EngineResult<f64>;

    /// Detach and release a loudness scan
    fn loudness_stop(&self, scan: ScanHandle) -> EngineResult<()>;
}
