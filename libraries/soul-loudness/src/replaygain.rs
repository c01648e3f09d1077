//! ReplayGain 2.0 calculation
//!
//! ReplayGain 2.0 is based on EBU R128 loudness measurement and uses
//! -18 LUFS as the reference level (updated from the original -14 dB RMS).
//!
//! # Gain Calculation
//!
//! - Track Gain = Reference Level (-18 LUFS) - Track Integrated Loudness
//! - Album Gain = Reference Level (-18 LUFS) - Album Average Loudness
//!
//! Applying a gain clips when `gain + true_peak_dbfs > 0`.

use crate::REPLAYGAIN_REFERENCE_LUFS;

/// Track gain in dB for an integrated loudness
///
/// `gain_to_lufs(lufs_to_gain(x)) == x` holds exactly for every `x <= -9.0`
/// LUFS; closer to full scale the round trip can be off by one rounding step
/// of the reference level.
pub fn lufs_to_gain(integrated_lufs: f64) -> f64 {
    REPLAYGAIN_REFERENCE_LUFS - integrated_lufs
}

/// Integrated loudness in LUFS for a track gain
pub fn gain_to_lufs(gain_db: f64) -> f64 {
    REPLAYGAIN_REFERENCE_LUFS - gain_db
}

/// Convert a linear amplitude to dBFS (`-inf` for zero)
pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Album-level ReplayGain information
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumGain {
    /// Gain to apply in dB for album normalization
    pub gain_db: f64,
    /// Maximum true peak across all tracks in dBFS
    pub peak_dbfs: f64,
    /// Duration-weighted average loudness of all tracks in LUFS
    pub average_lufs: f64,
    /// Number of tracks analyzed
    pub track_count: usize,
}

impl AlbumGain {
    /// Check if applying this gain would cause clipping on any track
    pub fn would_clip(&self) -> bool {
        self.gain_db + self.peak_dbfs > 0.0
    }
}

/// One measured track as input to album gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackLoudness {
    /// Integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// True peak, linear amplitude
    pub true_peak_linear: f64,
    /// Track duration in seconds
    pub duration_seconds: f64,
}

/// Calculator for ReplayGain values
#[derive(Debug, Clone)]
pub struct ReplayGainCalculator {
    /// Reference loudness level (default: -18 LUFS for RG2)
    reference_lufs: f64,
}

impl ReplayGainCalculator {
    /// Create a new calculator with the default reference level (-18 LUFS)
    pub fn new() -> Self {
        Self {
            reference_lufs: REPLAYGAIN_REFERENCE_LUFS,
        }
    }

    /// Create a calculator with a custom reference level
    pub fn with_reference(reference_lufs: f64) -> Self {
        Self { reference_lufs }
    }

    /// Reference level in LUFS
    pub fn reference_lufs(&self) -> f64 {
        self.reference_lufs
    }

    /// Calculate album gain from multiple track measurements
    ///
    /// Album gain uses the average loudness across all tracks, weighted by duration.
    /// The peak value is the maximum true peak across all tracks.
    pub fn album_gain(&self, tracks: &[TrackLoudness]) -> Option<AlbumGain> {
        if tracks.is_empty() {
            return None;
        }

        // LUFS is logarithmic: average in the power domain
        let mut total_power = 0.0_f64;
        let mut total_duration = 0.0_f64;
        let mut max_peak = 0.0_f64;

        for track in tracks {
            let power = 10.0_f64.powf(track.integrated_lufs / 10.0);
            total_power += power * track.duration_seconds;
            total_duration += track.duration_seconds;
            max_peak = max_peak.max(track.true_peak_linear);
        }

        if total_duration <= 0.0 {
            return None;
        }

        let average_lufs = 10.0 * (total_power / total_duration).log10();

        Some(AlbumGain {
            gain_db: self.reference_lufs - average_lufs,
            peak_dbfs: linear_to_db(max_peak),
            average_lufs,
            track_count: tracks.len(),
        })
    }
}

impl Default for ReplayGainCalculator {
    fn default() -> Self {
        Self::new()
    }
}
