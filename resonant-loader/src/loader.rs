//! Audio file decoding into sample buffers

use std::io::Cursor;
use std::path::Path;

use resonant_dsp::sample::{SampleBuffer, SampleBufferError};
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Frames per resampler chunk
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Errors that can occur while decoding audio
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported format")]
    UnsupportedFormat,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("Invalid sample buffer: {0}")]
    Buffer(#[from] SampleBufferError),
    #[error("Loader worker exited without a result")]
    WorkerDisconnected,
}

impl From<SymphoniaError> for LoadError {
    fn from(err: SymphoniaError) -> Self {
        match err {
            SymphoniaError::IoError(e) => LoadError::Io(e),
            SymphoniaError::Unsupported(_) => LoadError::UnsupportedFormat,
            other => LoadError::Decode(other.to_string()),
        }
    }
}

/// Decodes files or in-memory bytes with Symphonia, optionally resampling
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmDecoder {
    target_sample_rate: Option<u32>,
}

impl PcmDecoder {
    /// Decoder that keeps the source sample rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that resamples everything to `target_sample_rate`
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate: (target_sample_rate > 0).then_some(target_sample_rate),
        }
    }

    pub fn target_sample_rate(&self) -> Option<u32> {
        self.target_sample_rate
    }

    /// Decode an audio file
    pub fn decode_file(&self, path: &Path) -> Result<SampleBuffer, LoadError> {
        let file = std::fs::File::open(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.decode_source(Box::new(file), extension)
    }

    /// Decode an in-memory file, using `extension_hint` (e.g. "wav") to speed up probing
    pub fn decode_bytes(&self, bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<SampleBuffer, LoadError> {
        self.decode_source(Box::new(Cursor::new(bytes)), extension_hint)
    }

    fn decode_source(&self, source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<SampleBuffer, LoadError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let mut sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                // Corrupt packets are skipped
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count();

            let mut sample_buf = DecodeBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        if channels == 0 {
            return Err(LoadError::NoAudioTrack);
        }

        let (samples, sample_rate) = match self.target_sample_rate {
            Some(target) if target != sample_rate && !samples.is_empty() => {
                (resample(&samples, sample_rate, target, channels)?, target)
            }
            _ => (samples, sample_rate),
        };

        let buffer = SampleBuffer::from_f32(&samples, channels, sample_rate)?;
        tracing::debug!(
            frames = buffer.num_frames(),
            channels,
            sample_rate,
            "Decoded audio"
        );
        Ok(buffer)
    }
}

/// Decode a file at its native sample rate
pub fn decode_file(path: &Path) -> Result<SampleBuffer, LoadError> {
    PcmDecoder::new().decode_file(path)
}

/// Decode in-memory file bytes at their native sample rate
pub fn decode_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<SampleBuffer, LoadError> {
    PcmDecoder::new().decode_bytes(bytes, extension_hint)
}

/// Resample interleaved audio from `source_rate` to `target_rate`
fn resample(samples: &[f32], source_rate: u32, target_rate: u32, channels: usize) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    let frames = samples.len() / channels;

    let mut resampler =
        FftFixedInOut::<f32>::new(source_rate as usize, target_rate as usize, RESAMPLE_CHUNK_FRAMES, channels)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

    let deinterleaved: Vec<Vec<f32>> = (0..channels)
        .map(|ch| (0..frames).map(|f| samples[f * channels + ch]).collect())
        .collect();

    let chunk_size = resampler.input_frames_next();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];

    let mut pos = 0;
    while pos + chunk_size <= frames {
        let input_refs: Vec<&[f32]> = deinterleaved.iter().map(|ch| &ch[pos..pos + chunk_size]).collect();
        let resampled = resampler
            .process(&input_refs, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(data);
        }
        pos += chunk_size;
    }

    // Zero-pad the tail and keep only its share of the output
    if pos < frames {
        let remaining = frames - pos;
        let padded: Vec<Vec<f32>> = deinterleaved
            .iter()
            .map(|ch| {
                let mut v = ch[pos..].to_vec();
                v.resize(chunk_size, 0.0);
                v
            })
            .collect();
        let input_refs: Vec<&[f32]> = padded.iter().map(|v| v.as_slice()).collect();
        let resampled = resampler
            .process(&input_refs, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        let tail_frames = remaining * target_rate as usize / source_rate as usize;
        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(&data[..tail_frames.min(data.len())]);
        }
    }

    let output_frames = output.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_frames {
        for channel in &output {
            interleaved.push(channel[frame_idx]);
        }
    }
    Ok(interleaved)
}

/// Test helpers shared with the worker tests
#[cfg(test)]
pub(crate) mod test_util {
    /// Minimal 16-bit PCM WAV file
    pub fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::wav_bytes;
    use super::*;

    #[test]
    fn test_decode_wav_bytes() {
        let samples: Vec<i16> = (0..2000).map(|i| if i % 2 == 0 { 8192 } else { -8192 }).collect();
        let buffer = decode_bytes(wav_bytes(&samples, 2, 22050), Some("wav")).unwrap();
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.num_frames(), 1000);
        assert!((buffer.frame_sample(10, 0) - 0.25).abs() < 1e-3);
        assert!((buffer.frame_sample(10, 1) + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_resample_to_target_rate() {
        let samples = vec![0i16; 44100];
        let decoder = PcmDecoder::with_sample_rate(48000);
        let buffer = decoder.decode_bytes(wav_bytes(&samples, 1, 44100), Some("wav")).unwrap();
        assert_eq!(buffer.sample_rate(), 48000);
        assert!((buffer.num_frames() as i64 - 48000).abs() <= 2, "{}", buffer.num_frames());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = decode_bytes(vec![0x42; 512], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = decode_file(Path::new("/nonexistent/resonant/missing.wav"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
