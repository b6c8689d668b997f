//! Decoded PCM storage, playback and thread hand-off
//!
//! - [`SampleBuffer`]: immutable interleaved `i16` audio
//! - [`SampleBufferReader`]: pitched, seekable, scrubbable playback cursor
//! - [`sample_buffer_channel`]: SPSC hand-off of buffers to the audio thread

mod handoff;
mod reader;

pub use handoff::{sample_buffer_channel, SampleBufferReceiver, SampleBufferSender};
pub use reader::{SampleBufferReader, SeekType};

use thiserror::Error;

/// Errors that can occur when building a [`SampleBuffer`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleBufferError {
    #[error("sample buffer needs at least one channel")]
    ZeroChannels,
    #[error("sample buffer needs a positive sample rate")]
    ZeroSampleRate,
    #[error("{num_samples} samples do not divide into {num_channels} channels")]
    UnalignedSamples { num_samples: usize, num_channels: usize },
}

/// Interleaved 16-bit PCM, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    data: Vec<i16>,
    num_channels: usize,
    sample_rate: u32,
    num_frames: usize,
}

impl SampleBuffer {
    pub fn new(data: Vec<i16>, num_channels: usize, sample_rate: u32) -> Result<Self, SampleBufferError> {
        if num_channels == 0 {
            return Err(SampleBufferError::ZeroChannels);
        }
        if sample_rate == 0 {
            return Err(SampleBufferError::ZeroSampleRate);
        }
        if data.len() % num_channels != 0 {
            return Err(SampleBufferError::UnalignedSamples {
                num_samples: data.len(),
                num_channels,
            });
        }
        let num_frames = data.len() / num_channels;
        Ok(Self {
            data,
            num_channels,
            sample_rate,
            num_frames,
        })
    }

    /// Build from interleaved float samples in [-1, 1] (clipped)
    pub fn from_f32(samples: &[f32], num_channels: usize, sample_rate: u32) -> Result<Self, SampleBufferError> {
        let data = samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect();
        Self::new(data, num_channels, sample_rate)
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn num_samples(&self) -> usize {
        self.data.len()
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        self.num_frames as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }

    /// Sample of `channel` at `frame` as float in [-1, 1). Out of range reads are silent.
    #[inline]
    pub fn frame_sample(&self, frame: usize, channel: usize) -> f32 {
        if frame >= self.num_frames || channel >= self.num_channels {
            return 0.0;
        }
        self.data[frame * self.num_channels + channel] as f32 / 32768.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert_eq!(SampleBuffer::new(vec![0; 4], 0, 48000), Err(SampleBufferError::ZeroChannels));
        assert_eq!(SampleBuffer::new(vec![0; 4], 2, 0), Err(SampleBufferError::ZeroSampleRate));
        assert_eq!(
            SampleBuffer::new(vec![0; 5], 2, 48000),
            Err(SampleBufferError::UnalignedSamples {
                num_samples: 5,
                num_channels: 2
            })
        );
    }

    #[test]
    fn test_dimensions() {
        let buffer = SampleBuffer::new(vec![0; 96000], 2, 48000).unwrap();
        assert_eq!(buffer.num_samples(), 96000);
        assert_eq!(buffer.num_frames(), 48000);
        assert_eq!(buffer.num_channels(), 2);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_f32_and_frame_sample() {
        let buffer = SampleBuffer::from_f32(&[0.5, -0.5, 1.0, -2.0], 2, 44100).unwrap();
        assert!((buffer.frame_sample(0, 0) - 0.5).abs() < 1e-3);
        assert!((buffer.frame_sample(0, 1) + 0.5).abs() < 1e-3);
        assert!((buffer.frame_sample(1, 0) - 1.0).abs() < 1e-3);
        assert!((buffer.frame_sample(1, 1) + 1.0).abs() < 1e-3);
        assert_eq!(buffer.frame_sample(2, 0), 0.0);
        assert_eq!(buffer.frame_sample(0, 2), 0.0);
    }
}
