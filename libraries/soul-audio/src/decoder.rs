//! Streaming decoder implementation using Symphonia
use crate::error::{AudioError, Result};
use soul_core::types::ChannelInfo;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode-only stream over one file
///
/// Produces interleaved `f32` samples at the file's native rate and channel
/// count. Samples of a packet that did not fit the caller's buffer are kept
/// and returned first on the next read.
pub struct DecodeStream {
    path: PathBuf,
    /// Format reader (container parser)
    format: Box<dyn FormatReader>,
    /// Audio decoder
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: ChannelInfo,
    /// Total length in frames, if the container reports it
    n_frames: Option<u64>,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_buf_frames: u64,
    /// Decoded samples not yet handed out
    pending: Vec<f32>,
    pending_pos: usize,
    finished: bool,
}

impl DecodeStream {
    /// Probe `path` and prepare a decoder for its default track
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::Symphonia(format!("Failed to probe file: {}", e)))?;

        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| AudioError::UnsupportedFormat("No audio tracks found".to_string()))?;

        let frequency = track
            .codec_params
            .sample_rate
            .ok_or_else(|| AudioError::UnsupportedFormat("Unknown sample rate".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| AudioError::UnsupportedFormat("Unknown channel count".to_string()))?;
        let info = ChannelInfo {
            frequency,
            channels,
            source_bits: track.codec_params.bits_per_sample.map(|b| b as u16),
        };
        let track_id = track.id;
        let n_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Symphonia(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            info,
            n_frames,
            sample_buf: None,
            sample_buf_frames: 0,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        })
    }

    /// File this stream decodes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample format of the decoded output
    pub fn info(&self) -> ChannelInfo {
        self.info
    }

    /// Total length in frames, if known
    pub fn n_frames(&self) -> Option<u64> {
        self.n_frames
    }

    /// Fill `out` with the next interleaved samples
    ///
    /// Only whole frames are written. Returns the number of samples written;
    /// `0` once the stream has ended.
    pub fn read(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.info.channels.max(1) as usize;
        let wanted = out.len() / channels * channels;
        let mut written = 0;

        while written < wanted {
            if self.pending_pos >= self.pending.len() && !self.decode_next()? {
                break;
            }
            let available = &self.pending[self.pending_pos..];
            let n = available.len().min(wanted - written);
            out[written..written + n].copy_from_slice(&available[..n]);
            self.pending_pos += n;
            written += n;
        }

        Ok(written)
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::Symphonia(format!("Error reading packet: {}", e)));
                }
            };

            // Skip packets that are not for our track
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet; the next one may decode fine
                    tracing::debug!("Skipping undecodable packet in {}: {}", self.path.display(), e);
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let capacity = decoded.capacity() as u64;
            if self.sample_buf.is_none() || capacity > self.sample_buf_frames {
                self.sample_buf = Some(SampleBuffer::new(capacity, *decoded.spec()));
                self.sample_buf_frames = capacity;
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                self.pending.clear();
                self.pending.extend_from_slice(buf.samples());
                self.pending_pos = 0;
            }
            return Ok(true);
        }
    }
}

/// Decode `[start, end]` seconds of a file, downmixed to mono
///
/// Returns the samples and their sample rate.
pub fn decode_mono_range(path: &Path, start: f64, end: f64) -> Result<(Vec<f32>, u32)> {
    let mut stream = DecodeStream::open(path)?;
    let info = stream.info();
    let channels = info.channels.max(1) as usize;
    let rate = f64::from(info.frequency);

    let skip_frames = (start.max(0.0) * rate) as u64;
    let end_frame = (end.max(start) * rate).ceil() as u64;

    let mut mono = Vec::with_capacity((end_frame - skip_frames) as usize);
    let mut block = vec![0.0_f32; 4096 * channels];
    let mut frame_pos = 0_u64;

    while frame_pos < end_frame {
        let n = stream.read(&mut block)?;
        if n == 0 {
            break;
        }
        for frame in block[..n].chunks_exact(channels) {
            if frame_pos >= skip_frames && frame_pos < end_frame {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
            frame_pos += 1;
        }
    }

    Ok((mono, info.frequency))
}
