//! Result rows printed by the analyzer
use serde::Serialize;
use soul_engine::GainMeasurement;
use soul_loudness::AlbumGain;
use std::fmt;
use std::path::Path;

/// Analysis results for one file
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<GainReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GainReport {
    pub track_gain_db: f64,
    pub integrated_lufs: f64,
    pub loudness_range_lu: f64,
    pub true_peak_linear: f64,
    pub true_peak_db: f64,
    pub would_clip: bool,
}

impl From<&GainMeasurement> for GainReport {
    fn from(m: &GainMeasurement) -> Self {
        Self {
            track_gain_db: m.track_gain_db,
            integrated_lufs: m.integrated_lufs,
            loudness_range_lu: m.loudness_range_lu,
            true_peak_linear: m.true_peak_linear,
            true_peak_db: m.true_peak_db(),
            would_clip: m.would_clip(),
        }
    }
}

impl FileReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(bpm) = self.bpm {
            write!(f, "  {:.0} BPM", bpm)?;
        }
        if let Some(gain) = &self.gain {
            write!(
                f,
                "  {:+.2} dB ({:.2} LUFS, LRA {:.1} LU, peak {:.2} dBFS{})",
                gain.track_gain_db,
                gain.integrated_lufs,
                gain.loudness_range_lu,
                gain.true_peak_db,
                if gain.would_clip { ", clips" } else { "" }
            )?;
        }
        for error in &self.errors {
            write!(f, "  [{}]", error)?;
        }
        Ok(())
    }
}

/// Album gain summary
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AlbumReport {
    pub album_gain_db: f64,
    pub average_lufs: f64,
    pub peak_dbfs: f64,
    pub track_count: usize,
}

impl From<&AlbumGain> for AlbumReport {
    fn from(album: &AlbumGain) -> Self {
        Self {
            album_gain_db: album.gain_db,
            average_lufs: album.average_lufs,
            peak_dbfs: album.peak_dbfs,
            track_count: album.track_count,
        }
    }
}

impl fmt::Display for AlbumReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Album ({} tracks)  {:+.2} dB ({:.2} LUFS, peak {:.2} dBFS)",
            self.track_count, self.album_gain_db, self.average_lufs, self.peak_dbfs
        )
    }
}
