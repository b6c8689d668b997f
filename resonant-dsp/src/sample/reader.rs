//! Pitched, seekable playback cursor over a [`SampleBuffer`]

use std::sync::Arc;

use super::SampleBuffer;
use crate::util::LinearEase;

const MIN_PITCH: f32 = -16.0;
const MAX_PITCH: f32 = 16.0;
const DEFAULT_SCRUB_WIDTH_SEC: f32 = 0.1;
const MIN_SCRUB_WIDTH_SEC: f32 = 0.001;

/// Reference point for [`SampleBufferReader::seek_time`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SeekType {
    #[default]
    FromBeginning,
    FromCurrentPosition,
    FromEnd,
}

/// Reads a shared buffer at a variable rate with linear interpolation.
///
/// Playback speed is `pitch * buffer_rate / output_rate`, so a pitch of 1.0
/// plays the buffer at its natural speed whatever the output rate. In scrub
/// mode the cursor loops inside a window centred on the last seek position.
pub struct SampleBufferReader {
    sample_rate: f32,
    buffer: Option<Arc<SampleBuffer>>,
    buffer_ratio: f64,
    current_frame: f64,
    pitch: LinearEase,
    scrub_mode: bool,
    scrub_width_sec: f32,
    scrub_center_frame: f64,
}

impl SampleBufferReader {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        Self {
            sample_rate,
            buffer: None,
            buffer_ratio: 1.0,
            current_frame: 0.0,
            pitch: LinearEase::new(sample_rate, 1.0),
            scrub_mode: false,
            scrub_width_sec: DEFAULT_SCRUB_WIDTH_SEC,
            scrub_center_frame: 0.0,
        }
    }

    /// Swap the source buffer and rewind. Returns the previous buffer.
    pub fn set_buffer(&mut self, buffer: Option<Arc<SampleBuffer>>) -> Option<Arc<SampleBuffer>> {
        self.buffer_ratio = buffer
            .as_ref()
            .map(|b| b.sample_rate() as f64 / self.sample_rate as f64)
            .unwrap_or(1.0);
        self.current_frame = 0.0;
        self.scrub_center_frame = 0.0;
        std::mem::replace(&mut self.buffer, buffer)
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.buffer.as_ref()
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Move the cursor. With `wrap` the target wraps around the buffer,
    /// otherwise it is clamped to its bounds.
    pub fn seek_time(&mut self, time_sec: f32, seek_type: SeekType, wrap: bool) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let duration = buffer.duration_secs() as f64;
        let current = self.current_frame / buffer.sample_rate() as f64;
        let target = match seek_type {
            SeekType::FromBeginning => time_sec as f64,
            SeekType::FromCurrentPosition => current + time_sec as f64,
            SeekType::FromEnd => duration - time_sec as f64,
        };
        let target = if duration <= 0.0 {
            0.0
        } else if wrap {
            target.rem_euclid(duration)
        } else {
            target.clamp(0.0, duration)
        };
        self.current_frame = target * buffer.sample_rate() as f64;
        self.scrub_center_frame = self.current_frame;
    }

    /// Glide to a playback rate multiplier over `interp_time_sec`. Negative pitch plays backwards.
    pub fn set_pitch(&mut self, pitch: f32, interp_time_sec: f32) {
        self.pitch.set_value(pitch.clamp(MIN_PITCH, MAX_PITCH), interp_time_sec);
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.value()
    }

    pub fn set_scrub_mode(&mut self, scrub_mode: bool) {
        if scrub_mode && !self.scrub_mode {
            self.scrub_center_frame = self.current_frame;
        }
        self.scrub_mode = scrub_mode;
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub_mode
    }

    /// Width of the scrub loop in seconds
    pub fn set_scrub_width(&mut self, width_sec: f32) {
        self.scrub_width_sec = width_sec.max(MIN_SCRUB_WIDTH_SEC);
    }

    /// Cursor position as a fraction of the buffer (0.0 - 1.0)
    pub fn playback_progress(&self) -> f32 {
        match &self.buffer {
            Some(buffer) if !buffer.is_empty() => (self.current_frame / buffer.num_frames() as f64) as f32,
            _ => 0.0,
        }
    }

    /// Cursor position in seconds
    pub fn playback_time(&self) -> f32 {
        match &self.buffer {
            Some(buffer) => (self.current_frame / buffer.sample_rate() as f64) as f32,
            None => 0.0,
        }
    }

    /// Render `num_frames` interleaved frames of `out_channels` into `out`.
    ///
    /// Returns false once the cursor has run off either end without `wrap`,
    /// or if no buffer is set. The remainder of `out` is then silent.
    pub fn generate(&mut self, out: &mut [f32], num_frames: usize, out_channels: usize, wrap: bool) -> bool {
        let out_channels = out_channels.max(1);
        let num_frames = num_frames.min(out.len() / out_channels);
        let out = &mut out[..num_frames * out_channels];

        let buffer = match &self.buffer {
            Some(buffer) if !buffer.is_empty() => Arc::clone(buffer),
            _ => {
                out.fill(0.0);
                return false;
            }
        };
        let total = buffer.num_frames() as f64;

        for (i, frame) in out.chunks_exact_mut(out_channels).enumerate() {
            if !wrap && !self.scrub_mode && (self.current_frame < 0.0 || self.current_frame >= total) {
                out[i * out_channels..].fill(0.0);
                return false;
            }
            read_frame(&buffer, self.current_frame, frame);

            let pitch = self.pitch.next_value() as f64;
            self.current_frame += pitch * self.buffer_ratio;

            if self.scrub_mode {
                let half_width = 0.5 * self.scrub_width_sec as f64 * buffer.sample_rate() as f64;
                let start = (self.scrub_center_frame - half_width).max(0.0);
                let end = (self.scrub_center_frame + half_width).min(total);
                if end > start && (self.current_frame < start || self.current_frame >= end) {
                    self.current_frame = start + (self.current_frame - start).rem_euclid(end - start);
                }
            } else if wrap {
                self.current_frame = self.current_frame.rem_euclid(total);
            }
        }
        true
    }
}

/// Interpolated frame at a fractional position, mixed to the output channel count
#[inline]
fn read_frame(buffer: &SampleBuffer, position: f64, frame: &mut [f32]) {
    let index = position.floor();
    let fraction = (position - index) as f32;
    let index = index as usize;
    let next = if index + 1 >= buffer.num_frames() { 0 } else { index + 1 };
    let sample = |channel: usize| {
        let a = buffer.frame_sample(index, channel);
        let b = buffer.frame_sample(next, channel);
        a + fraction * (b - a)
    };

    let in_channels = buffer.num_channels();
    let out_channels = frame.len();
    if in_channels == out_channels {
        for (channel, out) in frame.iter_mut().enumerate() {
            *out = sample(channel);
        }
    } else if out_channels == 1 {
        frame[0] = (0..in_channels).map(sample).sum::<f32>() / in_channels as f32;
    } else if in_channels == 1 {
        frame.fill(sample(0));
    } else {
        for (channel, out) in frame.iter_mut().enumerate() {
            *out = sample(channel % in_channels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(num_frames: usize, num_channels: usize, sample_rate: u32) -> Arc<SampleBuffer> {
        let samples: Vec<f32> = (0..num_frames * num_channels)
            .map(|i| (i / num_channels) as f32 / num_frames as f32)
            .collect();
        Arc::new(SampleBuffer::from_f32(&samples, num_channels, sample_rate).unwrap())
    }

    #[test]
    fn test_no_buffer_is_silent() {
        let mut reader = SampleBufferReader::new(48000.0);
        let mut out = [1.0f32; 8];
        assert!(!reader.generate(&mut out, 4, 2, true));
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_unity_pitch_reads_frames_in_order() {
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(100, 1, 1000)));
        let mut out = [0.0f32; 10];
        assert!(reader.generate(&mut out, 10, 1, false));
        for (i, s) in out.iter().enumerate() {
            assert!((s - i as f32 / 100.0).abs() < 1e-3);
        }
        assert!((reader.playback_time() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_half_pitch_interpolates() {
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(100, 1, 1000)));
        reader.set_pitch(0.5, 0.0);
        let mut out = [0.0f32; 4];
        reader.generate(&mut out, 4, 1, false);
        assert!((out[1] - 0.005).abs() < 1e-3);
        assert!((out[2] - 0.01).abs() < 1e-3);
    }

    #[test]
    fn test_buffer_rate_is_respected() {
        // A 2 kHz buffer played at 1 kHz output advances two frames per output frame
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(100, 1, 2000)));
        let mut out = [0.0f32; 3];
        reader.generate(&mut out, 3, 1, false);
        assert!((out[2] - 0.04).abs() < 1e-3);
    }

    #[test]
    fn test_end_without_wrap_stops() {
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(10, 1, 1000)));
        let mut out = [1.0f32; 20];
        assert!(!reader.generate(&mut out, 20, 1, false));
        assert!(out[10..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_wrap_loops() {
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(10, 1, 1000)));
        let mut out = [0.0f32; 15];
        assert!(reader.generate(&mut out, 15, 1, true));
        assert!((out[12] - out[2]).abs() < 1e-6);
    }

    #[test]
    fn test_channel_mixing() {
        let mono = Arc::new(SampleBuffer::from_f32(&[0.5, 0.25], 1, 1000).unwrap());
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(mono));
        let mut out = [0.0f32; 2];
        reader.generate(&mut out, 1, 2, false);
        assert!((out[0] - 0.5).abs() < 1e-3 && (out[1] - 0.5).abs() < 1e-3);

        let stereo = Arc::new(SampleBuffer::from_f32(&[0.5, -0.5, 0.2, 0.4], 2, 1000).unwrap());
        reader.set_buffer(Some(stereo));
        let mut out = [1.0f32; 1];
        reader.generate(&mut out, 1, 1, false);
        assert!(out[0].abs() < 1e-3);
    }

    #[test]
    fn test_seek_types() {
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(1000, 1, 1000)));
        reader.seek_time(0.25, SeekType::FromBeginning, false);
        assert!((reader.playback_time() - 0.25).abs() < 1e-6);
        reader.seek_time(0.5, SeekType::FromCurrentPosition, false);
        assert!((reader.playback_time() - 0.75).abs() < 1e-6);
        reader.seek_time(0.1, SeekType::FromEnd, false);
        assert!((reader.playback_progress() - 0.9).abs() < 1e-6);
        reader.seek_time(1.5, SeekType::FromBeginning, false);
        assert!((reader.playback_progress() - 1.0).abs() < 1e-6);
        reader.seek_time(1.5, SeekType::FromBeginning, true);
        assert!((reader.playback_time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scrub_stays_in_window() {
        let mut reader = SampleBufferReader::new(1000.0);
        reader.set_buffer(Some(ramp_buffer(1000, 1, 1000)));
        reader.seek_time(0.5, SeekType::FromBeginning, false);
        reader.set_scrub_width(0.02);
        reader.set_scrub_mode(true);
        let mut out = [0.0f32; 200];
        assert!(reader.generate(&mut out, 200, 1, false));
        let time = reader.playback_time();
        assert!((0.49..0.51).contains(&time), "{}", time);
    }
}
