//! Real-time DSP building blocks for Resonant
//!
//! This crate provides the per-sample processing layer:
//! - Util: level/pitch conversions, easing, the control-thread parameter mailbox
//! - Delay, Filter: fractional delay lines, all-passes, biquad/ladder/SVF/one-pole filters
//! - Envelope, Osc: ADSR and follower, band-limited oscillators, LFOs, wavetables, noise
//! - Modulation: per-voice source/destination patch matrix
//! - Amp: gain and equal-power pan stage
//! - Effects: distortion, delay, modulation, reverb and dynamics units
//! - Granular: pooled grain engine over oscillators or a sample buffer
//! - Sample: immutable PCM buffers, playback reader, audio-thread hand-off
//!
//! Nothing in a `generate`/`process` path allocates, locks or blocks.

pub mod amp;
pub mod delay;
pub mod effects;
pub mod envelope;
pub mod filter;
pub mod granular;
pub mod modulation;
pub mod osc;
pub mod sample;
pub mod util;

pub use amp::Amp;
pub use delay::{DelayApf, DelayLine};
pub use effects::Effect;
pub use envelope::{Envelope, EnvelopeFollower, EnvelopeState, PeakMode};
pub use granular::{GranularMode, GranularSynth, GrainEnvelopeType};
pub use modulation::{ModulationMatrix, Patch, PatchDestination, PatchSource, VoiceId};
pub use osc::{Lfo, Osc, OscType, WaveTableOsc};
pub use sample::{sample_buffer_channel, SampleBuffer, SampleBufferError, SampleBufferReader, SeekType};
pub use util::{LinearEase, Params};
