//! Loudness analysis for Soul
//!
//! This crate provides:
//! - Streaming EBU R128 loudness measurement (integrated LUFS, loudness range,
//!   true peak)
//! - ReplayGain 2.0 calculation (track and album gain)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────────┐
//! │ Audio Block │ ──► │  Analyzer    │ ──► │ LUFS / LU / TP  │
//! └─────────────┘     └──────────────┘     └─────────────────┘
//!                                                  │
//!                                                  ▼
//!                                          ┌─────────────────┐
//!                                          │ ReplayGain      │
//!                                          └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use soul_loudness::{lufs_to_gain, gain_to_lufs};
//!
//! let gain = lufs_to_gain(-23.0);
//! assert_eq!(gain, 5.0);
//! assert_eq!(gain_to_lufs(gain), -23.0);
//! ```

#![forbid(unsafe_code)]

mod analyzer;
mod error;
mod replaygain;

pub use analyzer::LoudnessAnalyzer;
pub use error::{LoudnessError, Result};
pub use replaygain::{
    gain_to_lufs, linear_to_db, lufs_to_gain, AlbumGain, ReplayGainCalculator, TrackLoudness,
};

/// ReplayGain 2.0 reference loudness level (-18 LUFS)
/// This is the target loudness for normalized audio
pub const REPLAYGAIN_REFERENCE_LUFS: f64 = -18.0;
