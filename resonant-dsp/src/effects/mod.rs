//! Audio effects
//!
//! Every effect processes interleaved frames of a fixed channel count and
//! never allocates, locks or blocks while processing. Effects with a
//! settings struct also expose a [`Params`](crate::util::Params) handle that
//! a control thread can write to; pending settings are applied at the start
//! of the next `process` block.

mod bitcrusher;
mod chorus;
mod dynamics;
mod flexiverb;
mod foldback;
mod phaser;
mod plate_reverb;
mod ring_mod;
mod stereo_delay;
mod wave_shaper;

pub use bitcrusher::BitCrusher;
pub use chorus::{Chorus, ChorusLine, ChorusSettings};
pub use dynamics::{ChannelLink, DynamicsProcessor, DynamicsSettings, ProcessingMode, MAX_LOOKAHEAD_MSEC};
pub use flexiverb::{Flexiverb, FlexiverbComplexity, FlexiverbSettings};
pub use foldback::FoldbackDistortion;
pub use phaser::{Phaser, PhaserSettings, CONTROL_RATE as PHASER_CONTROL_RATE};
pub use plate_reverb::{PlateReverb, PlateReverbSettings};
pub use ring_mod::RingModulation;
pub use stereo_delay::{StereoDelay, StereoDelayMode, StereoDelaySettings};
pub use wave_shaper::WaveShaper;

/// Largest channel count any effect accepts
pub const MAX_CHANNELS: usize = 8;

/// Trait for audio effects
pub trait Effect: Send {
    /// Process one interleaved frame of `num_channels` samples
    fn process_frame(&mut self, input: &[f32], output: &mut [f32]);

    /// Called once at the start of every `process` block
    fn prepare_block(&mut self) {}

    /// Process interleaved frames. A trailing partial frame is left untouched.
    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        self.prepare_block();
        let n = self.num_channels();
        for (in_frame, out_frame) in input.chunks_exact(n).zip(output.chunks_exact_mut(n)) {
            self.process_frame(in_frame, out_frame);
        }
    }

    /// Process interleaved frames in place
    fn process_in_place(&mut self, samples: &mut [f32]) {
        self.prepare_block();
        let n = self.num_channels();
        debug_assert!(n <= MAX_CHANNELS, "effect channel count above MAX_CHANNELS");
        let mut frame = [0.0f32; MAX_CHANNELS];
        for chunk in samples.chunks_exact_mut(n) {
            frame[..n].copy_from_slice(chunk);
            self.process_frame(&frame[..n], chunk);
        }
    }

    /// Reset effect state
    fn reset(&mut self);

    /// Channels per frame
    fn num_channels(&self) -> usize;

    /// Get effect name
    fn name(&self) -> &'static str;
}

/// Clamp a requested channel count into [1, MAX_CHANNELS]
#[inline]
pub(crate) fn clamp_channels(num_channels: usize) -> usize {
    debug_assert!(
        (1..=MAX_CHANNELS).contains(&num_channels),
        "unsupported channel count {}",
        num_channels
    );
    num_channels.clamp(1, MAX_CHANNELS)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain(f32);

    impl Effect for Gain {
        fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
            for (o, i) in output.iter_mut().zip(input) {
                *o = i * self.0;
            }
        }

        fn reset(&mut self) {}

        fn num_channels(&self) -> usize {
            2
        }

        fn name(&self) -> &'static str {
            "Gain"
        }
    }

    #[test]
    fn test_process_and_in_place_agree() {
        let mut effect = Gain(0.5);
        let input = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut output = [9.0; 5];
        effect.process(&input, &mut output);
        assert_eq!(output, [0.5, 1.0, 1.5, 2.0, 9.0]);

        let mut samples = input;
        effect.process_in_place(&mut samples);
        assert_eq!(samples, [0.5, 1.0, 1.5, 2.0, 5.0]);
    }

    #[test]
    fn test_effects_are_object_safe() {
        let effects: Vec<Box<dyn Effect>> = vec![
            Box::new(BitCrusher::new(48000.0, 2)),
            Box::new(WaveShaper::new(2)),
            Box::new(FoldbackDistortion::new(2)),
            Box::new(RingModulation::new(48000.0, 2)),
            Box::new(StereoDelay::new(48000.0)),
            Box::new(Chorus::new(48000.0)),
            Box::new(Phaser::new(48000.0)),
            Box::new(Flexiverb::new(48000.0)),
            Box::new(PlateReverb::new(48000.0)),
            Box::new(DynamicsProcessor::new(48000.0, 2)),
        ];
        for mut effect in effects {
            let input = vec![0.25f32; effect.num_channels() * 64];
            let mut output = vec![0.0f32; input.len()];
            effect.process(&input, &mut output);
            assert!(output.iter().all(|s| s.is_finite()), "{}", effect.name());
            effect.reset();
        }
    }
}
