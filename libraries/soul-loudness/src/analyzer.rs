//! EBU R128 loudness analysis
//!
//! This module provides EBU R128-compliant loudness measurement using the ebur128 crate.
//! It measures, on request:
//! - Integrated loudness (LUFS) - the overall perceived loudness
//! - Loudness range (LRA) - the variation in loudness
//! - True peak (linear) - the maximum inter-sample peak level
//!
//! The analyzer is fed incrementally, so a decoder can measure while it pulls
//! blocks and read the results once the stream has ended.

use crate::error::{LoudnessError, Result};
use ebur128::{EbuR128, Mode};
use soul_core::types::LoudnessModes;

/// Streaming EBU R128 loudness analyzer
///
/// # Example
///
/// ```ignore
/// use soul_loudness::LoudnessAnalyzer;
///
/// let mut analyzer = LoudnessAnalyzer::new(44100, 2)?;
///
/// // Feed audio samples (interleaved f32) as they are decoded
/// analyzer.add_frames(&block)?;
///
/// println!("Integrated loudness: {:.1} LUFS", analyzer.integrated_lufs()?);
/// ```
pub struct LoudnessAnalyzer {
    /// EBU R128 analyzer instance
    ebur128: EbuR128,
    /// Requested measurements
    modes: LoudnessModes,
    /// Sample rate
    sample_rate: u32,
    /// Number of channels
    channels: u32,
    /// Total samples processed
    samples_processed: usize,
}

impl LoudnessAnalyzer {
    /// Create an analyzer measuring integrated loudness, range and true peak
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz (8000-384000)
    /// * `channels` - Number of channels (1-8)
    pub fn new(sample_rate: u32, channels: u32) -> Result<Self> {
        Self::with_modes(
            sample_rate,
            channels,
            LoudnessModes::INTEGRATED | LoudnessModes::RANGE | LoudnessModes::TRUE_PEAK,
        )
    }

    /// Create an analyzer for a subset of measurements
    ///
    /// Reading a measurement that was not requested fails with
    /// [`LoudnessError::ModeNotEnabled`].
    pub fn with_modes(sample_rate: u32, channels: u32, modes: LoudnessModes) -> Result<Self> {
        if !(8000..=384000).contains(&sample_rate) {
            return Err(LoudnessError::InvalidSampleRate(sample_rate));
        }
        if !(1..=8).contains(&channels) {
            return Err(LoudnessError::InvalidChannelCount(channels));
        }

        let ebur128 = EbuR128::new(channels, sample_rate, ebur128_mode(modes))?;

        Ok(Self {
            ebur128,
            modes,
            sample_rate,
            channels,
            samples_processed: 0,
        })
    }

    /// Add audio frames for analysis
    ///
    /// # Arguments
    /// * `samples` - Interleaved audio samples as f32 (-1.0 to 1.0)
    ///
    /// # Notes
    /// - Samples should be interleaved (L R L R... for stereo)
    /// - Length must be divisible by channel count
    pub fn add_frames(&mut self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        if samples.len() % self.channels as usize != 0 {
            return Err(LoudnessError::AnalysisError(format!(
                "Sample count {} is not divisible by channel count {}",
                samples.len(),
                self.channels
            )));
        }

        self.ebur128.add_frames_f32(samples)?;
        self.samples_processed += samples.len();

        Ok(())
    }

    /// Integrated loudness in LUFS
    ///
    /// Negative infinity for silent input.
    pub fn integrated_lufs(&self) -> Result<f64> {
        self.require(LoudnessModes::INTEGRATED, "Integrated loudness")?;
        Ok(self.ebur128.loudness_global()?)
    }

    /// Loudness range in LU
    pub fn loudness_range_lu(&self) -> Result<f64> {
        self.require(LoudnessModes::RANGE, "Loudness range")?;
        Ok(self.ebur128.loudness_range()?)
    }

    /// True peak as linear amplitude, maximum across all channels
    ///
    /// Uses 4x oversampling for sample rates < 96kHz as per ITU-R BS.1770.
    pub fn true_peak_linear(&self) -> Result<f64> {
        self.require(LoudnessModes::TRUE_PEAK, "True peak")?;

        let mut true_peak_linear = 0.0_f64;
        for ch in 0..self.channels {
            let peak = self.ebur128.true_peak(ch)?;
            if peak > true_peak_linear {
                true_peak_linear = peak;
            }
        }
        Ok(true_peak_linear)
    }

    fn require(&self, mode: LoudnessModes, name: &'static str) -> Result<()> {
        if !self.modes.contains(mode) {
            return Err(LoudnessError::ModeNotEnabled(name));
        }
        if self.samples_processed == 0 {
            return Err(LoudnessError::NoSamples);
        }
        Ok(())
    }

    /// Requested measurements
    pub fn modes(&self) -> LoudnessModes {
        self.modes
    }

    /// Get the number of samples processed
    pub fn samples_processed(&self) -> usize {
        self.samples_processed
    }

    /// Duration of the audio fed so far
    pub fn duration_seconds(&self) -> f64 {
        let frames = self.samples_processed / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }
}

fn ebur128_mode(modes: LoudnessModes) -> Mode {
    let mut mode = Mode::empty();
    if modes.contains(LoudnessModes::INTEGRATED) {
        mode |= Mode::I;
    }
    if modes.contains(LoudnessModes::RANGE) {
        mode |= Mode::LRA;
    }
    if modes.contains(LoudnessModes::TRUE_PEAK) {
        mode |= Mode::TRUE_PEAK;
    }
    mode
}
