//! Tempo estimation using an onset envelope and autocorrelation
//!
//! 1. Frame energy over hops of [`HOP_SIZE`] samples
//! 2. Half-wave rectified energy flux, lightly smoothed, as onset envelope
//! 3. Autocorrelation of the envelope over the lags of the BPM range
//! 4. Best lag refined by parabolic interpolation and converted to BPM

use soul_core::types::BpmRange;

/// Samples per onset frame (~5.8ms at 44.1kHz)
pub const HOP_SIZE: usize = 256;

/// Minimum autocorrelation at the beat lag relative to lag zero
const MIN_PERIODICITY: f32 = 0.1;

/// Minimum strongest energy rise relative to the loudest frame; steady tones
/// only ripple below this
const MIN_ONSET_STRENGTH: f32 = 0.05;

/// Smoothing kernel applied to the onset envelope
const SMOOTHING: [f32; 5] = [1.0, 2.0, 3.0, 2.0, 1.0];

/// Estimate the tempo of mono `samples` within `range`
///
/// Returns `0.0` when no stable tempo is found: silence, too little audio for
/// two beat periods at the slowest tempo, or no periodic onsets.
pub fn estimate_bpm(samples: &[f32], sample_rate: u32, range: BpmRange) -> f32 {
    if !range.is_valid() || sample_rate == 0 {
        return 0.0;
    }

    let Some(onset) = onset_envelope(samples) else {
        return 0.0;
    };
    let frames_per_second = sample_rate as f32 / HOP_SIZE as f32;

    let min_lag = ((frames_per_second * 60.0 / f32::from(range.max)).floor() as usize).max(1);
    let max_lag = (frames_per_second * 60.0 / f32::from(range.min)).ceil() as usize;

    if onset.len() < max_lag * 2 + 2 {
        return 0.0;
    }

    let energy = autocorrelation(&onset, 0);
    if energy <= 0.0 {
        return 0.0;
    }

    let correlations: Vec<f32> = (min_lag - 1..=max_lag + 1)
        .map(|lag| autocorrelation(&onset, lag))
        .collect();

    // Skip the padding entries on both ends
    let mut best = 1;
    for i in 2..correlations.len() - 1 {
        if correlations[i] > correlations[best] {
            best = i;
        }
    }

    let peak = correlations[best];
    if peak <= 0.0 || peak / energy < MIN_PERIODICITY {
        return 0.0;
    }

    let offset = parabolic_offset(correlations[best - 1], peak, correlations[best + 1]);
    let lag = (min_lag - 1 + best) as f32 + offset;

    let bpm = 60.0 * frames_per_second / lag;
    bpm.clamp(f32::from(range.min), f32::from(range.max))
}

/// Mean-removed, smoothed, half-wave rectified energy flux per hop
///
/// `None` if the audio has no onsets worth tracking.
fn onset_envelope(samples: &[f32]) -> Option<Vec<f32>> {
    let energies: Vec<f32> = samples
        .chunks_exact(HOP_SIZE)
        .map(|frame| frame.iter().map(|s| s * s).sum::<f32>() / HOP_SIZE as f32)
        .collect();

    if energies.len() < 2 {
        return None;
    }

    // Only rising energy marks an onset
    let flux: Vec<f32> = energies
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(0.0))
        .collect();

    let loudest = energies.iter().copied().fold(0.0_f32, f32::max);
    let strongest = flux.iter().copied().fold(0.0_f32, f32::max);
    if loudest <= 0.0 || strongest < MIN_ONSET_STRENGTH * loudest {
        return None;
    }

    let half = SMOOTHING.len() / 2;
    let mut smoothed = vec![0.0_f32; flux.len()];
    for (i, value) in smoothed.iter_mut().enumerate() {
        for (k, weight) in SMOOTHING.iter().enumerate() {
            if let Some(&x) = (i + k).checked_sub(half).and_then(|j| flux.get(j)) {
                *value += weight * x;
            }
        }
    }

    let mean = smoothed.iter().sum::<f32>() / smoothed.len() as f32;
    for value in &mut smoothed {
        *value -= mean;
    }
    Some(smoothed)
}

/// Biased autocorrelation: shorter lags win ties between beat multiples
fn autocorrelation(signal: &[f32], lag: usize) -> f32 {
    if lag >= signal.len() {
        return 0.0;
    }
    let sum: f32 = signal
        .iter()
        .zip(&signal[lag..])
        .map(|(a, b)| a * b)
        .sum();
    sum / signal.len() as f32
}

/// Vertex offset of the parabola through three equally spaced points
fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denominator = left - 2.0 * center + right;
    if denominator >= 0.0 {
        return 0.0;
    }
    (0.5 * (left - right) / denominator).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let total = (seconds * sample_rate as f32) as usize;
        let period = 60.0 / bpm * sample_rate as f32;
        let click_len = (0.02 * sample_rate as f32) as usize;
        let mut samples = vec![0.0_f32; total];

        let mut beat = 0.0_f32;
        while (beat as usize) < total {
            let start = beat as usize;
            for i in 0..click_len.min(total - start) {
                let t = i as f32 / sample_rate as f32;
                let envelope = (-t * 200.0).exp();
                samples[start + i] =
                    0.8 * envelope * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
            }
            beat += period;
        }
        samples
    }

    #[test]
    fn detects_click_tracks() {
        for bpm in [90.0_f32, 120.0, 140.0] {
            let samples = click_track(bpm, 20.0, 44100);
            let detected = estimate_bpm(&samples, 44100, BpmRange::DEFAULT);
            assert!(
                (detected - bpm).abs() <= 2.0,
                "expected {} BPM, detected {}",
                bpm,
                detected
            );
        }
    }

    #[test]
    fn silence_has_no_tempo() {
        let samples = vec![0.0_f32; 44100 * 10];
        assert_eq!(estimate_bpm(&samples, 44100, BpmRange::DEFAULT), 0.0);
    }

    #[test]
    fn steady_tone_has_no_tempo() {
        let samples: Vec<f32> = (0..44100 * 10)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        assert_eq!(estimate_bpm(&samples, 44100, BpmRange::DEFAULT), 0.0);
    }

    #[test]
    fn too_short_has_no_tempo() {
        let samples = click_track(120.0, 1.0, 44100);
        assert_eq!(estimate_bpm(&samples, 44100, BpmRange::DEFAULT), 0.0);
    }

    #[test]
    fn invalid_range_has_no_tempo() {
        let samples = click_track(120.0, 10.0, 44100);
        assert_eq!(estimate_bpm(&samples, 44100, BpmRange::new(0, 200)), 0.0);
        assert_eq!(estimate_bpm(&samples, 44100, BpmRange::new(150, 100)), 0.0);
    }

    #[test]
    fn parabola_vertex() {
        assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
        assert!(parabolic_offset(1.5, 2.0, 1.0) < 0.0);
        assert!(parabolic_offset(1.0, 2.0, 1.5) > 0.0);
        assert_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
    }
}
