//! Soul Audio
//!
//! Decode-only reference implementation of the [`soul_core::AudioEngine`]
//! contract.
//!
//! This crate provides:
//! - Streaming decoding via Symphonia (WAV, AIFF, MP3, OGG natively; FLAC,
//!   AAC, ALAC, Opus and others once their format plugin is loaded)
//! - Loudness scans attached to a stream, measured with ebur128
//! - Offline tempo estimation over a time range of a stream
//!
//! # Example: Decoding a file
//!
//! ```rust,no_run
//! use soul_audio::SymphoniaEngine;
//! use soul_core::types::{Device, InitFlags, StreamFlags};
//! use soul_core::AudioEngine;
//! use std::path::Path;
//!
//! let engine = SymphoniaEngine::new();
//! engine.init(Device::NoSound, 44100, InitFlags::empty()).unwrap();
//!
//! let stream = engine
//!     .stream_create_file(Path::new("/music/song.wav"), StreamFlags::DECODE | StreamFlags::FLOAT)
//!     .unwrap();
//!
//! let mut buffer = vec![0_u8; 64 * 1024];
//! let mut total = 0;
//! while let Ok(n) = engine.channel_data(stream, &mut buffer) {
//!     if n == 0 {
//!         break;
//!     }
//!     total += n;
//! }
//! println!("Decoded {} bytes", total);
//!
//! engine.stream_free(stream).unwrap();
//! engine.free().unwrap();
//! ```

#![forbid(unsafe_code)]

mod decoder;
mod engine;
mod error;
mod plugins;
pub mod tempo;

pub use decoder::{decode_mono_range, DecodeStream};
pub use engine::{SymphoniaEngine, DEVICE_NAME};
pub use error::{AudioError, Result};
pub use plugins::{PluginRegistry, NATIVE_EXTENSIONS, PLUGIN_VERSION};
pub use tempo::{estimate_bpm, HOP_SIZE};
