//! Soul Core
//!
//! Platform-agnostic contract between the analysis orchestration layer and the
//! audio engine that does the actual decoding and DSP.
//!
//! This crate provides the foundational building blocks shared by every
//! engine backend and by the orchestration crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Engine contract**: the `AudioEngine` trait, mirroring a handle-based
//!   native audio API (init/free, decode-only streams, plugins, tempo and
//!   loudness add-ons)
//! - **Engine types**: opaque handles, flag sets, device/channel/plugin info,
//!   and the packed `BpmRange` wire parameter
//! - **Error Handling**: engine `ErrorCode`s plus the unified `SoulError` and
//!   `Result` types
//!
//! # Example
//!
//! ```rust
//! use soul_core::types::BpmRange;
//!
//! let range = BpmRange::new(60, 200);
//! let packed = range.pack();
//! assert_eq!(packed >> 16, 200);
//! assert_eq!(packed & 0xFFFF, 60);
//! assert_eq!(BpmRange::unpack(packed), range);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod progress;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorCode, Result, SoulError};
pub use progress::{report_progress, ProgressCallback, ProgressFn};
pub use traits::{AudioEngine, EngineResult};

#[cfg(feature = "mock")]
pub use traits::MockAudioEngine;

// Export all types
pub use types::{
    BpmRange, ChannelInfo, ConfigOption, Device, DeviceInfo, ExclusiveFlags, InitFlags,
    LoudnessMode, LoudnessModes, PluginFormat, PluginHandle, PluginInfo, ScanHandle,
    StreamFlags, StreamHandle, TempoFlags,
};
