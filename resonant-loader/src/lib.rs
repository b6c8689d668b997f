//! PCM loading for Resonant - decoding, resampling and background loading

mod loader;
mod pcm_loader;

pub use loader::{decode_bytes, decode_file, LoadError, PcmDecoder};
pub use pcm_loader::PcmLoader;
